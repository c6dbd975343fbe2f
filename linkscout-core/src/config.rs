use crate::domain::Blacklist;
use crate::error::{LinkscoutError, Result};
use crate::graph::SharedLinkParams;
use crate::run::Sources;
use linkscout_scanner::{
    ContentSource, FixtureSet, HttpContentSource, HttpLinkProvider, HttpNerService,
    HttpSearchEngine, LinkProvider, NerService, SearchEngine,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/linkscout/config.json";

/// Aggregators, social networks and URL shorteners that link to everything.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "pinterest.com",
    "reddit.com",
    "tiktok.com",
    "google.com",
    "wikipedia.org",
    "amazon.com",
    "apple.com",
    "t.co",
    "bit.ly",
    "goo.gl",
    "wordpress.com",
    "blogspot.com",
    "medium.com",
    "tumblr.com",
];

/// A named HTTP endpoint with an optional API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Where link data, entities, page text and search results come from.
///
/// When `fixtures` is set, every source is served from that JSON file and the
/// HTTP endpoints are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<EndpointConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ner: Option<EndpointConfig>,
    pub engines: Vec<EndpointConfig>,
    /// Fetch home pages over plain HTTP instead of HTTPS.
    pub content_insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub min_shared: usize,
    pub max_referrers: usize,
    pub max_outlinks_per_referrer: usize,
    pub max_second_level: usize,
    pub link_cap: usize,
    pub context_window: usize,
    pub top_k: usize,
    pub sampling_threshold: usize,
    pub max_per_tier: usize,
    pub confidence_threshold: f32,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
    pub results_per_query: usize,
    pub blacklist: Blacklist,
    pub sources: SourceConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_shared: 2,
            max_referrers: 100,
            max_outlinks_per_referrer: 200,
            max_second_level: 50,
            link_cap: 1000,
            context_window: 100,
            top_k: 50,
            sampling_threshold: 12,
            max_per_tier: 40,
            confidence_threshold: 0.6,
            request_timeout_secs: 20,
            min_request_interval_ms: 1000,
            results_per_query: 10,
            blacklist: Blacklist::new(DEFAULT_BLACKLIST),
            sources: SourceConfig::default(),
        }
    }
}

/// `~/.config/linkscout/config.json`, tilde-expanded.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref())
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LinkscoutError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| LinkscoutError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given (it must exist), otherwise the default location if
    /// present, otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LinkscoutError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LinkscoutError::Config(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| LinkscoutError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn shared_link_params(&self) -> SharedLinkParams {
        SharedLinkParams {
            min_shared: self.min_shared,
            max_referrers: self.max_referrers,
            max_outlinks_per_referrer: self.max_outlinks_per_referrer,
        }
    }

    /// Instantiate the configured adapters.
    pub fn build_sources(&self) -> Result<Sources> {
        if let Some(path) = &self.sources.fixtures {
            let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
            let fixtures = Arc::new(
                FixtureSet::load(&path)
                    .map_err(|e| LinkscoutError::Config(format!("{}: {}", path.display(), e)))?,
            );
            info!("Using fixture sources from {}", path.display());
            return Ok(Sources::from_fixtures(&fixtures));
        }

        let timeout = self.request_timeout();
        let config_error = |e: linkscout_scanner::SourceError| LinkscoutError::Config(e.to_string());

        let provider = match &self.sources.provider {
            Some(endpoint) => Some(Arc::new(
                HttpLinkProvider::new(&endpoint.name, &endpoint.url, timeout)
                    .map_err(config_error)?
                    .with_api_key(endpoint.api_key.clone()),
            ) as Arc<dyn LinkProvider>),
            None => None,
        };

        let ner = match &self.sources.ner {
            Some(endpoint) => Some(Arc::new(
                HttpNerService::new(&endpoint.name, &endpoint.url, timeout)
                    .map_err(config_error)?
                    .with_api_key(endpoint.api_key.clone()),
            ) as Arc<dyn NerService>),
            None => None,
        };

        let engines = self
            .sources
            .engines
            .iter()
            .map(|endpoint| {
                HttpSearchEngine::new(&endpoint.name, &endpoint.url, timeout)
                    .map(|engine| {
                        Arc::new(
                            engine
                                .with_api_key(endpoint.api_key.clone())
                                .with_results_per_query(self.results_per_query),
                        ) as Arc<dyn SearchEngine>
                    })
                    .map_err(config_error)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut content = HttpContentSource::new(timeout).map_err(config_error)?;
        if self.sources.content_insecure {
            content = content.with_scheme("http");
        }

        Ok(Sources {
            provider,
            engines,
            ner,
            content: Some(Arc::new(content) as Arc<dyn ContentSource>),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.min_shared, 2);
        assert_eq!(config.link_cap, 1000);
        assert_eq!(config.top_k, 50);
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert!(config.blacklist.contains("facebook.com"));
        assert!(!config.blacklist.contains("x.com"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RunConfig::from_json(r#"{"min_shared": 3, "blacklist": ["spam.com"]}"#).unwrap();
        assert_eq!(config.min_shared, 3);
        assert_eq!(config.max_referrers, 100);
        assert!(config.blacklist.contains("spam.com"));
        assert!(!config.blacklist.contains("facebook.com"));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            RunConfig::from_json("{not json"),
            Err(LinkscoutError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = RunConfig::default();
        config.top_k = 7;
        config.sources.engines.push(EndpointConfig {
            name: "web".to_string(),
            url: "https://search.example.com/api".to_string(),
            api_key: None,
        });

        config.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(RunConfig::load_or_default(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn test_fixture_sources() {
        let mut fixture = NamedTempFile::new().unwrap();
        write!(fixture, r#"{{"engines": {{"web": {{}}, "news": {{}}}}}}"#).unwrap();

        let mut config = RunConfig::default();
        config.sources.fixtures = Some(fixture.path().to_path_buf());
        let sources = config.build_sources().unwrap();

        assert!(sources.provider.is_some());
        assert!(sources.ner.is_some());
        assert_eq!(sources.engines.len(), 2);
    }

    #[test]
    fn test_http_sources_need_valid_urls() {
        let mut config = RunConfig::default();
        config.sources.provider = Some(EndpointConfig {
            name: "links".to_string(),
            url: "not a url".to_string(),
            api_key: None,
        });
        assert!(matches!(config.build_sources(), Err(LinkscoutError::Config(_))));
    }
}

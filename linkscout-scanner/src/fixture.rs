//! JSON fixture sources.
//!
//! A single fixture file can stand in for the link provider, the NER service,
//! the content source and any number of search engines. Used for offline runs
//! (`sources.fixtures` in the config) and throughout the tests.
//!
//! ```json
//! {
//!   "links": {
//!     "example.com": {
//!       "referrers": ["a.com", {"source": "b.com", "target": "example.com", "anchor": "Example"}],
//!       "outlinks": ["x.com"],
//!       "outlink_count": 120
//!     }
//!   },
//!   "content": { "example.com": "Alice Smith and Bob Jones run Acme." },
//!   "entities": { "example.com": [{"name": "Alice Smith", "type": "person", "confidence": 0.9}] },
//!   "engines": {
//!     "web": { "sites": { "example.com": [{"url": "https://example.com/team", "snippet": "Alice Smith, Bob Jones"}] } }
//!   }
//! }
//! ```

use crate::content::ContentSource;
use crate::engine::SearchEngine;
use crate::error::{Result, SourceError};
use crate::ner::NerService;
use crate::provider::LinkProvider;
use crate::result::{LinkEdge, LinkPage, RawEntity, SearchHit};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FixtureEdge {
    Domain(String),
    Edge(LinkEdge),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureLinks {
    #[serde(default)]
    referrers: Vec<FixtureEdge>,
    #[serde(default)]
    outlinks: Vec<FixtureEdge>,
    #[serde(default)]
    outlink_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureEngine {
    /// Exact query string to hits.
    #[serde(default)]
    queries: HashMap<String, Vec<SearchHit>>,
    /// Candidate hits per `site:` domain; a hit matches a query when its
    /// snippet contains every quoted phrase of the query.
    #[serde(default)]
    sites: HashMap<String, Vec<SearchHit>>,
    /// Every call fails.
    #[serde(default)]
    unavailable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureSet {
    #[serde(default)]
    links: HashMap<String, FixtureLinks>,
    #[serde(default)]
    content: HashMap<String, String>,
    #[serde(default)]
    entities: HashMap<String, Vec<RawEntity>>,
    #[serde(default)]
    engines: HashMap<String, FixtureEngine>,
}

impl FixtureSet {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn engine_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn link_provider(self: &Arc<Self>, name: &str) -> FixtureLinkProvider {
        FixtureLinkProvider {
            name: name.to_string(),
            set: self.clone(),
        }
    }

    pub fn search_engine(self: &Arc<Self>, name: &str) -> FixtureSearchEngine {
        FixtureSearchEngine {
            name: name.to_string(),
            set: self.clone(),
        }
    }

    pub fn ner_service(self: &Arc<Self>) -> FixtureNer {
        FixtureNer { set: self.clone() }
    }

    pub fn content_source(self: &Arc<Self>) -> FixtureContent {
        FixtureContent { set: self.clone() }
    }
}

fn to_page(edges: &[FixtureEdge], domain: &str, inbound: bool, limit: usize) -> LinkPage {
    let mut converted: Vec<LinkEdge> = edges
        .iter()
        .map(|edge| match edge {
            FixtureEdge::Edge(e) => e.clone(),
            FixtureEdge::Domain(other) if inbound => LinkEdge::new(other.clone(), domain),
            FixtureEdge::Domain(other) => LinkEdge::new(domain, other.clone()),
        })
        .collect();
    let truncated = converted.len() > limit;
    converted.truncate(limit);
    LinkPage {
        edges: converted,
        truncated,
    }
}

fn snippet_matches(hit: &SearchHit, query: &str) -> bool {
    let snippet = hit.snippet.as_deref().unwrap_or_default().to_lowercase();
    query
        .split('"')
        .skip(1)
        .step_by(2)
        .filter(|phrase| !phrase.is_empty())
        .all(|phrase| snippet.contains(&phrase.to_lowercase()))
}

fn site_of(query: &str) -> Option<&str> {
    query
        .split_whitespace()
        .find_map(|token| token.strip_prefix("site:"))
}

pub struct FixtureLinkProvider {
    name: String,
    set: Arc<FixtureSet>,
}

#[async_trait]
impl LinkProvider for FixtureLinkProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn referrers(&self, domain: &str, limit: usize) -> Result<LinkPage> {
        Ok(self
            .set
            .links
            .get(domain)
            .map(|links| to_page(&links.referrers, domain, true, limit))
            .unwrap_or_default())
    }

    async fn outlinks(&self, domain: &str, limit: usize) -> Result<LinkPage> {
        Ok(self
            .set
            .links
            .get(domain)
            .map(|links| to_page(&links.outlinks, domain, false, limit))
            .unwrap_or_default())
    }

    async fn outlink_count(&self, domain: &str) -> Result<u64> {
        Ok(self
            .set
            .links
            .get(domain)
            .map(|links| {
                links
                    .outlink_count
                    .unwrap_or(links.outlinks.len() as u64)
            })
            .unwrap_or(0))
    }
}

pub struct FixtureSearchEngine {
    name: String,
    set: Arc<FixtureSet>,
}

#[async_trait]
impl SearchEngine for FixtureSearchEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let Some(engine) = self.set.engines.get(&self.name) else {
            return Ok(Vec::new());
        };
        if engine.unavailable {
            return Err(SourceError::Disabled(self.name.clone()));
        }
        if let Some(hits) = engine.queries.get(query) {
            return Ok(hits.clone());
        }

        let candidates = site_of(query)
            .and_then(|site| engine.sites.get(site))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(candidates
            .iter()
            .filter(|hit| snippet_matches(hit, query))
            .cloned()
            .collect())
    }
}

pub struct FixtureNer {
    set: Arc<FixtureSet>,
}

#[async_trait]
impl NerService for FixtureNer {
    fn name(&self) -> &str {
        "ner"
    }

    async fn extract(&self, _text: &str, domain: &str) -> Result<Vec<RawEntity>> {
        Ok(self.set.entities.get(domain).cloned().unwrap_or_default())
    }
}

pub struct FixtureContent {
    set: Arc<FixtureSet>,
}

#[async_trait]
impl ContentSource for FixtureContent {
    fn name(&self) -> &str {
        "content"
    }

    async fn fetch_text(&self, domain: &str) -> Result<String> {
        self.set
            .content
            .get(domain)
            .cloned()
            .ok_or_else(|| SourceError::Other(format!("no fixture content for {}", domain)))
    }
}

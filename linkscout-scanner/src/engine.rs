use crate::content::http_client;
use crate::error::{Result, SourceError};
use crate::result::SearchHit;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A pluggable web search engine.
///
/// Any error means the engine is unavailable; callers decide whether to stop
/// using it.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// JSON search endpoint answering `GET {endpoint}?q=..&num=..` with
/// `{"results": [{"url", "snippet", "rank"}]}`.
pub struct HttpSearchEngine {
    name: String,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    results_per_query: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl HttpSearchEngine {
    pub fn new(name: impl Into<String>, endpoint: &str, timeout: Duration) -> Result<Self> {
        Url::parse(endpoint).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        Ok(Self {
            name: name.into(),
            client: http_client(timeout)?,
            endpoint: endpoint.to_string(),
            api_key: None,
            results_per_query: 10,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_results_per_query(mut self, results_per_query: usize) -> Self {
        self.results_per_query = results_per_query;
        self
    }
}

#[async_trait]
impl SearchEngine for HttpSearchEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        debug!("{} searching {}", self.name, query);

        let mut params = vec![
            ("q", query.to_string()),
            ("num", self.results_per_query.to_string()),
        ];
        if let Some(ref key) = self.api_key {
            params.push(("key", key.clone()));
        }

        let response = self.client.get(&self.endpoint).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let mut parsed: SearchResponse = serde_json::from_str(&body)?;
        parsed.results.truncate(self.results_per_query);
        Ok(parsed.results)
    }
}

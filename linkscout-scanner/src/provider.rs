use crate::content::http_client;
use crate::error::{Result, SourceError};
use crate::result::LinkPage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// External link-data provider.
///
/// Results are sampled and capped by the provider; callers must treat them as
/// a lower bound.
#[async_trait]
pub trait LinkProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Edges pointing at `domain` (source = referrer).
    async fn referrers(&self, domain: &str, limit: usize) -> Result<LinkPage>;

    /// Edges leaving `domain` (target = linked domain).
    async fn outlinks(&self, domain: &str, limit: usize) -> Result<LinkPage>;

    /// Total number of outbound links the provider knows for `domain`.
    async fn outlink_count(&self, domain: &str) -> Result<u64>;
}

pub struct HttpLinkProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct OutlinkCountResponse {
    outlinks: u64,
}

impl HttpLinkProvider {
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            name: name.into(),
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/v1/{}", self.base_url, path);
        debug!("{} GET {} {:?}", self.name, url, query);

        let mut request = self.client.get(&url).query(query);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl LinkProvider for HttpLinkProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn referrers(&self, domain: &str, limit: usize) -> Result<LinkPage> {
        self.get_json(
            "referrers",
            &[("domain", domain.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn outlinks(&self, domain: &str, limit: usize) -> Result<LinkPage> {
        self.get_json(
            "outlinks",
            &[("domain", domain.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn outlink_count(&self, domain: &str) -> Result<u64> {
        let response: OutlinkCountResponse = self
            .get_json("outlink-count", &[("domain", domain.to_string())])
            .await?;
        Ok(response.outlinks)
    }
}

use crate::error::{Result, SourceError};
use crate::html::visible_text;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Produces the text that entity extraction runs over.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_text(&self, domain: &str) -> Result<String>;
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent("linkscout/0.1 (https://github.com/trapdoorsec/linkscout)")
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Fetches a domain's home page and reduces it to visible text.
pub struct HttpContentSource {
    client: Client,
    scheme: String,
}

impl HttpContentSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            scheme: "https".to_string(),
        })
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    fn name(&self) -> &str {
        "content"
    }

    async fn fetch_text(&self, domain: &str) -> Result<String> {
        let url = format!("{}://{}/", self.scheme, domain);
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        let body = response.text().await?;

        let text = if is_html { visible_text(&body) } else { body };
        info!(
            "Fetched {} in {:?} ({} chars of text)",
            url,
            start.elapsed(),
            text.len()
        );
        Ok(text)
    }
}

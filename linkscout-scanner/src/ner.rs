use crate::content::http_client;
use crate::error::{Result, SourceError};
use crate::result::RawEntity;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Black-box named-entity recognition service.
#[async_trait]
pub trait NerService: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, text: &str, domain: &str) -> Result<Vec<RawEntity>>;
}

pub struct HttpNerService {
    name: String,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct NerRequest<'a> {
    text: &'a str,
    domain: &'a str,
}

#[derive(Deserialize)]
struct NerResponse {
    #[serde(default)]
    entities: Vec<RawEntity>,
}

impl HttpNerService {
    pub fn new(name: impl Into<String>, endpoint: &str, timeout: Duration) -> Result<Self> {
        Url::parse(endpoint).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        Ok(Self {
            name: name.into(),
            client: http_client(timeout)?,
            endpoint: endpoint.to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[async_trait]
impl NerService for HttpNerService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, text: &str, domain: &str) -> Result<Vec<RawEntity>> {
        debug!("{} extracting entities for {} ({} bytes)", self.name, domain, text.len());

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&NerRequest { text, domain });
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
        let parsed: NerResponse = serde_json::from_str(&body)?;
        Ok(parsed.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::EntityKind;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    #[tokio::test]
    async fn test_extract_posts_text_and_domain() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ner"))
            .and(body_partial_json(serde_json::json!({"domain": "example.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"entities":[
                    {"name":"Alice Smith","type":"PERSON","confidence":0.93},
                    {"name":"Acme Corp","type":"ORG","confidence":0.81},
                    {"name":"Minneapolis","type":"GPE","confidence":0.99}
                ]}"#,
            ))
            .mount(&mock_server)
            .await;

        let ner = HttpNerService::new(
            "ner",
            &format!("{}/ner", mock_server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let entities = ner
            .extract("Alice Smith founded Acme Corp.", "example.com")
            .await
            .unwrap();

        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].kind(), Some(EntityKind::Person));
        assert_eq!(entities[1].kind(), Some(EntityKind::Organization));
        assert_eq!(entities[2].kind(), None);
    }

    #[tokio::test]
    async fn test_extract_failure_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let ner = HttpNerService::new("ner", &mock_server.uri(), Duration::from_secs(5)).unwrap();
        assert!(ner.extract("text", "example.com").await.is_err());
    }
}

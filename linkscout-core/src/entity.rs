use crate::diagnostics::Diagnostics;
use crate::error::{LinkscoutError, Result};
use crate::model::{Entity, entity_key};
use linkscout_scanner::{NerService, RawEntity, RequestGate};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

fn text_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Keep persons and organizations at or above `threshold`, one entry per
/// normalized name (highest confidence wins), sorted by normalized name.
pub fn dedupe_entities(raw: &[RawEntity], domain: &str, threshold: f32) -> Vec<Entity> {
    let mut best: BTreeMap<String, Entity> = BTreeMap::new();

    for mention in raw {
        let Some(kind) = mention.kind() else {
            continue;
        };
        if mention.confidence < threshold {
            continue;
        }
        let key = entity_key(&mention.name);
        if key.is_empty() {
            continue;
        }

        let candidate = Entity {
            name: mention.name.split_whitespace().collect::<Vec<_>>().join(" "),
            key: key.clone(),
            kind,
            confidence: mention.confidence,
            source_domain: domain.to_string(),
        };
        match best.get(&key) {
            Some(existing) if existing.confidence >= candidate.confidence => {}
            _ => {
                best.insert(key, candidate);
            }
        }
    }

    best.into_values().collect()
}

/// Named-entity extraction with per-(domain, content) memoization.
pub struct EntityExtractor {
    service: Arc<dyn NerService>,
    gate: Arc<RequestGate>,
    diagnostics: Diagnostics,
    timeout: Duration,
    threshold: f32,
    memo: Mutex<HashMap<(String, String), Vec<Entity>>>,
    service_calls: AtomicUsize,
}

impl EntityExtractor {
    pub fn new(service: Arc<dyn NerService>, gate: Arc<RequestGate>, diagnostics: Diagnostics) -> Self {
        Self {
            service,
            gate,
            diagnostics,
            timeout: Duration::from_secs(20),
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            memo: Mutex::new(HashMap::new()),
            service_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn service_calls(&self) -> usize {
        self.service_calls.load(Ordering::SeqCst)
    }

    /// Extract entities from `text` fetched for `domain`.
    ///
    /// Service errors and timeouts become `ExtractionUnavailable` and are
    /// recorded in the diagnostics; they are not memoized.
    pub async fn extract(&self, domain: &str, text: &str) -> Result<Vec<Entity>> {
        if text.trim().is_empty() {
            debug!("No text for {}, skipping extraction", domain);
            return Ok(Vec::new());
        }

        let key = (domain.to_string(), text_digest(text));
        if let Some(cached) = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(cached.clone());
        }

        self.service_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .gate
            .run(
                self.service.name(),
                tokio::time::timeout(self.timeout, self.service.extract(text, domain)),
            )
            .await;

        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(self.unavailable(domain, e.to_string())),
            Err(_) => {
                return Err(self.unavailable(domain, format!("timed out after {:?}", self.timeout)));
            }
        };

        let entities = dedupe_entities(&raw, domain, self.threshold);
        info!(
            "Extracted {} entities for {} ({} mentions)",
            entities.len(),
            domain,
            raw.len()
        );
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entities.clone());
        Ok(entities)
    }

    /// Forget every memoized extraction for `domain`.
    pub fn invalidate(&self, domain: &str) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(d, _), _| d != domain);
    }

    fn unavailable(&self, domain: &str, reason: String) -> LinkscoutError {
        let error = LinkscoutError::ExtractionUnavailable {
            service: self.service.name().to_string(),
            domain: domain.to_string(),
            reason,
        };
        self.diagnostics.record(&error);
        error
    }
}

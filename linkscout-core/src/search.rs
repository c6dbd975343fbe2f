use crate::combination::SearchQuery;
use crate::diagnostics::{Diagnostics, SourceKind};
use crate::error::LinkscoutError;
use crate::scoring::ResultAggregator;
use futures::future::join_all;
use linkscout_scanner::{RequestGate, SearchEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-engine outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneSummary {
    pub engine: String,
    pub requests: usize,
    pub hits: usize,
    pub stopped_early: bool,
}

/// Fans combination queries out to every configured search engine.
///
/// Each engine gets one lane: its queries run one after another through the
/// shared gate, while lanes for different engines run concurrently. An engine
/// that fails once is marked unavailable in the diagnostics and receives no
/// further queries for the rest of the run.
pub struct SearchOrchestrator {
    engines: Vec<Arc<dyn SearchEngine>>,
    gate: Arc<RequestGate>,
    diagnostics: Diagnostics,
    timeout: Duration,
}

impl SearchOrchestrator {
    pub fn new(
        engines: Vec<Arc<dyn SearchEngine>>,
        gate: Arc<RequestGate>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            engines,
            gate,
            diagnostics,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    /// Engines not yet marked unavailable.
    pub fn available_engines(&self) -> usize {
        self.engines
            .iter()
            .filter(|e| !self.diagnostics.is_unavailable(SourceKind::Engine, e.name()))
            .count()
    }

    pub async fn dispatch(
        &self,
        queries: &[SearchQuery],
        aggregator: &ResultAggregator,
        cancel: &CancellationToken,
    ) -> Vec<LaneSummary> {
        if queries.is_empty() {
            return Vec::new();
        }
        info!(
            "Dispatching {} queries to {} engines",
            queries.len(),
            self.engines.len()
        );
        let lanes = self
            .engines
            .iter()
            .map(|engine| self.lane(engine.as_ref(), queries, aggregator, cancel));
        join_all(lanes).await
    }

    async fn lane(
        &self,
        engine: &dyn SearchEngine,
        queries: &[SearchQuery],
        aggregator: &ResultAggregator,
        cancel: &CancellationToken,
    ) -> LaneSummary {
        let name = engine.name();
        let mut summary = LaneSummary {
            engine: name.to_string(),
            ..Default::default()
        };

        for query in queries {
            if cancel.is_cancelled() || self.diagnostics.is_unavailable(SourceKind::Engine, name) {
                summary.stopped_early = true;
                break;
            }

            summary.requests += 1;
            let call = self.gate.run(
                name,
                tokio::time::timeout(self.timeout, engine.search(&query.text)),
            );
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.stopped_early = true;
                    break;
                }
                outcome = call => outcome,
            };

            let reason = match outcome {
                Ok(Ok(hits)) => {
                    debug!("{} returned {} hits for {}", name, hits.len(), query.text);
                    summary.hits += hits.len();
                    for hit in hits {
                        aggregator.insert(&hit.url, hit.snippet.as_deref(), &query.combination, name);
                    }
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.timeout),
            };

            self.diagnostics.record(&LinkscoutError::EngineUnavailable {
                engine: name.to_string(),
                reason,
            });
            summary.stopped_early = true;
            break;
        }
        summary
    }
}

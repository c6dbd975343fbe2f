use crate::error::LinkscoutError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// What kind of collaborator a source is. Names are only unique within a kind,
/// so unavailability is tracked per `kind:name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Engine,
    Provider,
    Ner,
    Content,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Engine => "engine",
            SourceKind::Provider => "provider",
            SourceKind::Ner => "ner",
            SourceKind::Content => "content",
        }
    }
}

/// Key under which a source appears in `unavailable_sources`, e.g. `engine:web`.
pub fn source_key(kind: SourceKind, name: &str) -> String {
    format!("{}:{}", kind.label(), name)
}

/// A single unit of work that failed (one engine, one domain fetch, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnitFailure {
    pub source: String,
    pub unit: String,
    pub error: String,
}

/// What went wrong during a run, reported alongside the results so readers can
/// judge completeness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunDiagnostics {
    /// `kind:name` of every source that failed at least once.
    pub unavailable_sources: BTreeSet<String>,
    pub failures: BTreeSet<UnitFailure>,
    /// `provider:domain` pairs whose results were capped or sampled.
    pub limits_reached: BTreeSet<String>,
    pub cancelled: bool,
}

impl RunDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.unavailable_sources.is_empty()
            && self.failures.is_empty()
            && self.limits_reached.is_empty()
            && !self.cancelled
    }
}

/// Shared, cloneable handle to the run diagnostics.
///
/// Recording is idempotent: the same failure reported twice is kept once.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    inner: Arc<Mutex<RunDiagnostics>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut RunDiagnostics) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn push_failure(&self, source: String, unit: &str, error: &LinkscoutError, unavailable: bool) {
        self.with(|d| {
            if unavailable {
                d.unavailable_sources.insert(source.clone());
            }
            d.failures.insert(UnitFailure {
                source,
                unit: unit.to_string(),
                error: error.to_string(),
            });
        });
    }

    /// Record a per-unit failure under the source it belongs to.
    pub fn record(&self, error: &LinkscoutError) {
        if !matches!(error, LinkscoutError::ProviderLimitReached { .. }) {
            warn!("{}", error);
        }
        match error {
            LinkscoutError::EngineUnavailable { engine, .. } => {
                self.push_failure(source_key(SourceKind::Engine, engine), engine, error, true)
            }
            LinkscoutError::ProviderUnavailable {
                provider, domain, ..
            } => self.push_failure(source_key(SourceKind::Provider, provider), domain, error, true),
            LinkscoutError::ExtractionUnavailable {
                service, domain, ..
            } => self.push_failure(source_key(SourceKind::Ner, service), domain, error, true),
            LinkscoutError::ContentUnavailable {
                service, domain, ..
            } => self.push_failure(source_key(SourceKind::Content, service), domain, error, true),
            LinkscoutError::ProviderLimitReached {
                provider, domain, ..
            } => self.flag_limit(provider, domain),
            LinkscoutError::InvalidDomain(domain) => {
                self.push_failure("input".to_string(), domain, error, false)
            }
            LinkscoutError::InsufficientDomains(_) | LinkscoutError::Config(_) => {
                self.push_failure("run".to_string(), "run", error, false)
            }
        }
    }

    pub fn flag_limit(&self, provider: &str, domain: &str) {
        self.with(|d| {
            d.limits_reached.insert(format!("{}:{}", provider, domain));
        });
    }

    pub fn mark_cancelled(&self) {
        self.with(|d| d.cancelled = true);
    }

    pub fn is_unavailable(&self, kind: SourceKind, name: &str) -> bool {
        let key = source_key(kind, name);
        self.with(|d| d.unavailable_sources.contains(&key))
    }

    pub fn snapshot(&self) -> RunDiagnostics {
        self.with(|d| d.clone())
    }
}

use thiserror::Error;

/// Failure taxonomy for a relationship-discovery run.
///
/// Everything except `InvalidDomain`, `InsufficientDomains` and `Config` is a
/// per-unit failure: it is recorded in the run diagnostics and the run goes on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkscoutError {
    #[error("entity extraction ({service}) unavailable for {domain}: {reason}")]
    ExtractionUnavailable {
        service: String,
        domain: String,
        reason: String,
    },

    #[error("search engine {engine} unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    #[error("link provider {provider} unavailable for {domain}: {reason}")]
    ProviderUnavailable {
        provider: String,
        domain: String,
        reason: String,
    },

    #[error("link provider {provider} capped results for {domain} at {limit}")]
    ProviderLimitReached {
        provider: String,
        domain: String,
        limit: usize,
    },

    #[error("content source {service} unavailable for {domain}: {reason}")]
    ContentUnavailable {
        service: String,
        domain: String,
        reason: String,
    },

    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    #[error("comparison needs at least two distinct domains, got {0}")]
    InsufficientDomains(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LinkscoutError>;

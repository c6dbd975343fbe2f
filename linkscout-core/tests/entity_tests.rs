// Tests for entity extraction functionality

mod common;

use common::ScriptedNer;
use linkscout_core::diagnostics::{Diagnostics, SourceKind};
use linkscout_core::entity::EntityExtractor;
use linkscout_core::error::LinkscoutError;
use linkscout_scanner::RequestGate;
use std::sync::Arc;
use std::time::Duration;

const TEXT: &str = "Alice Smith and Bob Jones founded Acme Corp.";

fn team_ner(name: &str) -> ScriptedNer {
    ScriptedNer::new(name).entities(
        "example.com",
        &[
            ("Alice Smith", "person", 0.95),
            ("Bob Jones", "person", 0.7),
            ("Acme Corp", "org", 0.8),
            ("Paris", "GPE", 0.99),
        ],
    )
}

fn extractor(ner: Arc<ScriptedNer>, diagnostics: &Diagnostics) -> EntityExtractor {
    EntityExtractor::new(
        ner,
        Arc::new(RequestGate::new(Duration::ZERO)),
        diagnostics.clone(),
    )
    .with_timeout(Duration::from_secs(5))
}

// ============================================================================
// Memoization Tests
// ============================================================================

#[tokio::test]
async fn test_repeat_extraction_is_memoized() {
    let ner = Arc::new(team_ner("spacy"));
    let extractor = extractor(ner.clone(), &Diagnostics::new());

    let first = extractor.extract("example.com", TEXT).await.unwrap();
    let second = extractor.extract("example.com", TEXT).await.unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert_eq!(extractor.service_calls(), 1);
    assert_eq!(ner.calls(), 1);
}

#[tokio::test]
async fn test_changed_content_is_extracted_again() {
    let ner = Arc::new(team_ner("spacy"));
    let extractor = extractor(ner.clone(), &Diagnostics::new());

    extractor.extract("example.com", TEXT).await.unwrap();
    extractor
        .extract("example.com", "Alice Smith left Acme Corp.")
        .await
        .unwrap();

    assert_eq!(extractor.service_calls(), 2);
}

#[tokio::test]
async fn test_invalidate_forces_new_call() {
    let ner = Arc::new(team_ner("spacy"));
    let extractor = extractor(ner.clone(), &Diagnostics::new());

    extractor.extract("example.com", TEXT).await.unwrap();
    extractor.invalidate("other.com");
    extractor.extract("example.com", TEXT).await.unwrap();
    assert_eq!(extractor.service_calls(), 1);

    extractor.invalidate("example.com");
    extractor.extract("example.com", TEXT).await.unwrap();
    assert_eq!(extractor.service_calls(), 2);
    assert_eq!(ner.calls(), 2);
}

#[tokio::test]
async fn test_blank_text_skips_the_service() {
    let ner = Arc::new(team_ner("spacy"));
    let extractor = extractor(ner.clone(), &Diagnostics::new());

    let entities = extractor.extract("example.com", "  \n\t ").await.unwrap();

    assert!(entities.is_empty());
    assert_eq!(extractor.service_calls(), 0);
    assert_eq!(ner.calls(), 0);
}

#[tokio::test]
async fn test_threshold_filters_low_confidence_mentions() {
    let ner = Arc::new(team_ner("spacy"));
    let extractor = extractor(ner, &Diagnostics::new()).with_threshold(0.9);

    let entities = extractor.extract("example.com", TEXT).await.unwrap();

    let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Alice Smith"]);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_service_error_is_recorded_and_not_memoized() {
    let ner = Arc::new(team_ner("spacy").failing("example.com"));
    let diagnostics = Diagnostics::new();
    let extractor = extractor(ner.clone(), &diagnostics);

    let err = extractor.extract("example.com", TEXT).await.unwrap_err();
    let LinkscoutError::ExtractionUnavailable { service, domain, .. } = &err else {
        panic!("unexpected error: {:?}", err);
    };
    assert_eq!(service, "spacy");
    assert_eq!(domain, "example.com");

    assert!(diagnostics.is_unavailable(SourceKind::Ner, "spacy"));
    let snapshot = diagnostics.snapshot();
    assert!(
        snapshot
            .failures
            .iter()
            .any(|f| f.source == "ner:spacy" && f.unit == "example.com")
    );

    assert!(extractor.extract("example.com", TEXT).await.is_err());
    assert_eq!(ner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_service_times_out() {
    let ner = Arc::new(team_ner("spacy").with_delay(Duration::from_secs(60)));
    let diagnostics = Diagnostics::new();
    let extractor = extractor(ner.clone(), &diagnostics);

    let err = extractor.extract("example.com", TEXT).await.unwrap_err();

    assert!(matches!(
        &err,
        LinkscoutError::ExtractionUnavailable { reason, .. } if reason.contains("timed out")
    ));
    assert!(diagnostics.is_unavailable(SourceKind::Ner, "spacy"));
    assert_eq!(extractor.service_calls(), 1);
}

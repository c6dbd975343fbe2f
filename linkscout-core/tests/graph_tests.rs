// Tests for the backlink cache and graph algorithms

mod common;

use common::{MapProvider, client_for, scenario_a};
use futures::future::join_all;
use linkscout_core::diagnostics::{Diagnostics, SourceKind};
use linkscout_core::domain::Blacklist;
use linkscout_core::graph::{GraphAnalyzer, SharedLinkParams};
use linkscout_core::error::LinkscoutError;
use linkscout_core::cache::BacklinkGraphClient;
use linkscout_scanner::RequestGate;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn params(min_shared: usize) -> SharedLinkParams {
    SharedLinkParams {
        min_shared,
        ..SharedLinkParams::default()
    }
}

fn analyzer(provider: MapProvider, blacklist: Blacklist) -> (GraphAnalyzer, Diagnostics) {
    let diagnostics = Diagnostics::new();
    let client = client_for(Arc::new(provider), &diagnostics);
    (GraphAnalyzer::new(client, Arc::new(blacklist)), diagnostics)
}

// ============================================================================
// Similar Profile / Co-Linked Tests
// ============================================================================

#[tokio::test]
async fn test_similar_profile_scenario_min_shared_two() {
    let (analyzer, _) = analyzer(scenario_a(), Blacklist::default());
    let cancel = CancellationToken::new();

    let similar = analyzer
        .similar_profile("example.com", &params(2), &cancel)
        .await
        .unwrap();

    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].domain, "x.com");
    assert_eq!(similar[0].count, 2);
    assert_eq!(similar[0].via, vec!["a.com".to_string(), "b.com".to_string()]);
}

#[tokio::test]
async fn test_similar_profile_scenario_min_shared_three_is_empty() {
    let (analyzer, _) = analyzer(scenario_a(), Blacklist::default());
    let similar = analyzer
        .similar_profile("example.com", &params(3), &CancellationToken::new())
        .await
        .unwrap();
    assert!(similar.is_empty());
}

#[tokio::test]
async fn test_similar_profile_higher_threshold_is_subset() {
    let provider = MapProvider::new()
        .referrers("example.com", &["a.com", "b.com", "c.com", "d.com"])
        .outlinks("a.com", &["w.com", "x.com", "y.com", "z.com"])
        .outlinks("b.com", &["w.com", "x.com", "y.com"])
        .outlinks("c.com", &["w.com", "x.com"])
        .outlinks("d.com", &["w.com"]);
    let (analyzer, _) = analyzer(provider, Blacklist::default());
    let cancel = CancellationToken::new();

    let mut previous: Option<Vec<String>> = None;
    for k in 1..=5 {
        let names: Vec<String> = analyzer
            .similar_profile("example.com", &params(k), &cancel)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.domain)
            .collect();
        if let Some(prev) = &previous {
            assert!(names.iter().all(|n| prev.contains(n)), "k={} not a subset", k);
        }
        previous = Some(names);
    }
    assert_eq!(previous, Some(Vec::new()));
}

#[tokio::test]
async fn test_co_linked_uses_same_mechanics() {
    let (analyzer, _) = analyzer(scenario_a(), Blacklist::default());
    let cancel = CancellationToken::new();

    let co_linked = analyzer.co_linked("example.com", &params(2), &cancel).await.unwrap();
    let similar = analyzer
        .similar_profile("example.com", &params(2), &cancel)
        .await
        .unwrap();
    assert_eq!(co_linked, similar);
}

#[tokio::test]
async fn test_blacklisted_referrer_is_not_a_hop() {
    let (analyzer, _) = analyzer(scenario_a(), Blacklist::new(["a.com"]));
    let similar = analyzer
        .similar_profile("example.com", &params(2), &CancellationToken::new())
        .await
        .unwrap();
    assert!(similar.is_empty());
}

#[tokio::test]
async fn test_blacklisted_candidate_never_reported() {
    let (analyzer, _) = analyzer(scenario_a(), Blacklist::new(["x.com"]));
    let similar = analyzer
        .similar_profile("example.com", &params(1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        similar.iter().map(|s| s.domain.as_str()).collect::<Vec<_>>(),
        vec!["y.com"]
    );
}

#[tokio::test]
async fn test_failed_referrer_is_skipped_and_recorded() {
    let provider = scenario_a().failing("b.com");
    let (analyzer, diagnostics) = analyzer(provider, Blacklist::default());

    let similar = analyzer
        .similar_profile("example.com", &params(1), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(similar.len(), 2);
    assert!(similar.iter().all(|s| s.count == 1));
    let snapshot = diagnostics.snapshot();
    assert!(snapshot.unavailable_sources.contains("provider:map"));
    assert!(snapshot.failures.iter().any(|f| f.unit == "b.com"));
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_result() {
    let (analyzer, _) = analyzer(scenario_a(), Blacklist::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let similar = analyzer
        .similar_profile("example.com", &params(1), &cancel)
        .await
        .unwrap();
    assert!(similar.is_empty());
}

// ============================================================================
// Twice-Removed Tests
// ============================================================================

#[tokio::test]
async fn test_twice_removed_exclusions() {
    let provider = MapProvider::new()
        .referrers("example.com", &["a.com", "b.com"])
        .referrers("a.com", &["p.com", "b.com", "example.com", "spam.com"])
        .referrers("b.com", &["p.com", "q.com"]);
    let (analyzer, _) = analyzer(provider, Blacklist::new(["spam.com"]));

    let paths = analyzer
        .twice_removed("example.com", 100, 50, &CancellationToken::new())
        .await
        .unwrap();

    let triples: Vec<(&str, &str)> = paths
        .iter()
        .map(|p| (p.domain.as_str(), p.via.as_str()))
        .collect();
    assert_eq!(
        triples,
        vec![("p.com", "a.com"), ("p.com", "b.com"), ("q.com", "b.com")]
    );
    assert!(paths.iter().all(|p| p.target == "example.com"));
}

#[tokio::test]
async fn test_twice_removed_respects_second_level_cap() {
    let provider = MapProvider::new()
        .referrers("example.com", &["a.com"])
        .referrers("a.com", &["p.com", "q.com", "r.com"]);
    let (analyzer, _) = analyzer(provider, Blacklist::default());

    let paths = analyzer
        .twice_removed("example.com", 100, 2, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(paths.len(), 2);
}

#[tokio::test]
async fn test_twice_removed_blacklisted_first_level_is_not_a_hop() {
    let provider = MapProvider::new()
        .referrers("example.com", &["a.com", "spam.com"])
        .referrers("spam.com", &["p.com"]);
    let (analyzer, _) = analyzer(provider, Blacklist::new(["spam.com"]));

    let paths = analyzer
        .twice_removed("example.com", 100, 50, &CancellationToken::new())
        .await
        .unwrap();
    assert!(paths.is_empty());
}

// ============================================================================
// Cache Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_fetch() {
    let provider = Arc::new(scenario_a().with_delay(Duration::from_millis(200)));
    let diagnostics = Diagnostics::new();
    let client = client_for(provider.clone(), &diagnostics);

    let results = join_all((0..10).map(|_| client.get_referrers("example.com", 100))).await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(client.provider_calls(), 1);
    assert!(results.iter().all(|r| r.as_ref().unwrap().len() == 3));
}

#[tokio::test]
async fn test_limit_truncates_lexically_from_cache() {
    let provider = Arc::new(scenario_a());
    let client = client_for(provider.clone(), &Diagnostics::new());

    let two = client.get_referrers("example.com", 2).await.unwrap();
    let all = client.get_referrers("Example.COM", 10).await.unwrap();

    assert_eq!(two.into_iter().collect::<Vec<_>>(), vec!["a.com", "b.com"]);
    assert_eq!(all.len(), 3);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_failures_are_cached_until_refresh() {
    let provider = Arc::new(MapProvider::new().failing("down.com"));
    let diagnostics = Diagnostics::new();
    let client = client_for(provider.clone(), &diagnostics);

    let first = client.get_outlinks("down.com", 10).await;
    let second = client.get_outlinks("down.com", 10).await;
    assert!(matches!(first, Err(LinkscoutError::ProviderUnavailable { .. })));
    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);

    client.refresh("down.com");
    let _ = client.get_outlinks("down.com", 10).await;
    assert_eq!(provider.calls(), 2);
    assert_eq!(diagnostics.snapshot().failures.len(), 1);
}

#[tokio::test]
async fn test_provider_cap_is_flagged() {
    let provider = Arc::new(scenario_a());
    let diagnostics = Diagnostics::new();
    let client = BacklinkGraphClient::new(
        provider,
        Arc::new(RequestGate::new(Duration::ZERO)),
        diagnostics.clone(),
    )
    .with_link_cap(2);

    let referrers = client.get_referrers("example.com", 100).await.unwrap();

    assert_eq!(referrers.len(), 2);
    let snapshot = diagnostics.snapshot();
    assert!(snapshot.limits_reached.contains("map:example.com"));
    assert!(snapshot.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let provider = Arc::new(scenario_a().with_delay(Duration::from_secs(60)));
    let diagnostics = Diagnostics::new();
    let client = client_for(provider, &diagnostics);

    let result = client.get_referrers("example.com", 10).await;
    assert!(matches!(result, Err(LinkscoutError::ProviderUnavailable { .. })));
    assert!(diagnostics.is_unavailable(SourceKind::Provider, "map"));
}

#[tokio::test]
async fn test_profile_annotates_authority() {
    let provider = Arc::new(scenario_a().count("example.com", 250));
    let client = client_for(provider, &Diagnostics::new());

    let profile = client
        .profile("example.com", &Blacklist::default())
        .await
        .unwrap();
    assert_eq!(profile.referrers.len(), 3);
    assert_eq!(profile.outlink_count, Some(250));
    assert_eq!(profile.authority, Some(8));
    assert!(!profile.blacklisted);
}

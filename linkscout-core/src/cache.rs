use crate::authority::authority_score;
use crate::diagnostics::Diagnostics;
use crate::domain::{Blacklist, normalize_domain};
use crate::error::{LinkscoutError, Result};
use crate::model::{BacklinkEdge, DomainProfile};
use linkscout_scanner::{LinkEdge, LinkPage, LinkProvider, RequestGate};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Referrers,
    Outlinks,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Referrers => "referrers",
            Direction::Outlinks => "outlinks",
        }
    }
}

/// One provider answer for one (direction, domain), normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSet {
    pub domain: String,
    pub direction: Direction,
    pub neighbors: BTreeSet<String>,
    pub edges: Vec<BacklinkEdge>,
    pub truncated: bool,
}

type Slot<T> = Arc<OnceCell<Result<T>>>;

/// Run-scoped, single-flight cache over a link-data provider.
///
/// Each (direction, domain) is fetched at most once per run with the run's
/// `link_cap`; failures are cached as well. Concurrent callers for the same key
/// wait on the one in-flight fetch. Provider calls go through the shared
/// [`RequestGate`] keyed by provider name.
pub struct BacklinkGraphClient {
    provider: Arc<dyn LinkProvider>,
    gate: Arc<RequestGate>,
    diagnostics: Diagnostics,
    timeout: Duration,
    link_cap: usize,
    links: Mutex<HashMap<(Direction, String), Slot<Arc<LinkSet>>>>,
    counts: Mutex<HashMap<String, Slot<u64>>>,
    provider_calls: AtomicUsize,
}

impl BacklinkGraphClient {
    pub fn new(
        provider: Arc<dyn LinkProvider>,
        gate: Arc<RequestGate>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            provider,
            gate,
            diagnostics,
            timeout: Duration::from_secs(20),
            link_cap: 1000,
            links: Mutex::new(HashMap::new()),
            counts: Mutex::new(HashMap::new()),
            provider_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_link_cap(mut self, link_cap: usize) -> Self {
        self.link_cap = link_cap.max(1);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of calls actually made to the provider.
    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::SeqCst)
    }

    /// Referring domains of `domain`, at most `limit`, in lexical order.
    pub async fn get_referrers(&self, domain: &str, limit: usize) -> Result<BTreeSet<String>> {
        let set = self.link_set(Direction::Referrers, domain).await?;
        Ok(set.neighbors.iter().take(limit).cloned().collect())
    }

    /// Domains `domain` links to, at most `limit`, in lexical order.
    pub async fn get_outlinks(&self, domain: &str, limit: usize) -> Result<BTreeSet<String>> {
        let set = self.link_set(Direction::Outlinks, domain).await?;
        Ok(set.neighbors.iter().take(limit).cloned().collect())
    }

    /// Inbound edges with their anchor metadata.
    pub async fn get_referrer_edges(&self, domain: &str) -> Result<Vec<BacklinkEdge>> {
        let set = self.link_set(Direction::Referrers, domain).await?;
        Ok(set.edges.clone())
    }

    pub async fn get_outlink_count(&self, domain: &str) -> Result<u64> {
        let domain = normalize_domain(domain)?;
        let slot = {
            let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
            counts.entry(domain.clone()).or_default().clone()
        };
        slot.get_or_init(|| self.fetch_count(&domain)).await.clone()
    }

    /// Assemble the run's view of a domain. Fetch failures leave the
    /// corresponding parts empty; they are already in the diagnostics.
    pub async fn profile(&self, domain: &str, blacklist: &Blacklist) -> Result<DomainProfile> {
        let domain = normalize_domain(domain)?;
        let (referrers, outlinks, count) = tokio::join!(
            self.get_referrers(&domain, self.link_cap),
            self.get_outlinks(&domain, self.link_cap),
            self.get_outlink_count(&domain),
        );
        let outlink_count = count.ok();
        Ok(DomainProfile {
            blacklisted: blacklist.contains(&domain),
            referrers: referrers.map(|r| r.into_iter().collect()).unwrap_or_default(),
            outlinks: outlinks.map(|o| o.into_iter().collect()).unwrap_or_default(),
            authority: outlink_count.map(authority_score),
            outlink_count,
            domain,
        })
    }

    /// Drop everything cached for `domain` so the next request re-fetches it.
    pub fn refresh(&self, domain: &str) {
        let Ok(domain) = normalize_domain(domain) else {
            return;
        };
        {
            let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
            links.remove(&(Direction::Referrers, domain.clone()));
            links.remove(&(Direction::Outlinks, domain.clone()));
        }
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.remove(&domain);
        debug!("Refreshed cache entries for {}", domain);
    }

    async fn link_set(&self, direction: Direction, domain: &str) -> Result<Arc<LinkSet>> {
        let domain = normalize_domain(domain)?;
        let slot = {
            let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
            links
                .entry((direction, domain.clone()))
                .or_default()
                .clone()
        };
        slot.get_or_init(|| self.fetch(direction, &domain))
            .await
            .clone()
    }

    fn unavailable(&self, domain: &str, reason: String) -> LinkscoutError {
        let error = LinkscoutError::ProviderUnavailable {
            provider: self.provider.name().to_string(),
            domain: domain.to_string(),
            reason,
        };
        self.diagnostics.record(&error);
        error
    }

    async fn fetch(&self, direction: Direction, domain: &str) -> Result<Arc<LinkSet>> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        let provider = self.provider.clone();
        let cap = self.link_cap;

        let call = async {
            match direction {
                Direction::Referrers => provider.referrers(domain, cap).await,
                Direction::Outlinks => provider.outlinks(domain, cap).await,
            }
        };
        let outcome = self
            .gate
            .run(provider.name(), tokio::time::timeout(self.timeout, call))
            .await;

        let page = match outcome {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(self.unavailable(domain, e.to_string())),
            Err(_) => {
                return Err(self.unavailable(domain, format!("timed out after {:?}", self.timeout)));
            }
        };

        let set = build_link_set(direction, domain, page, cap);
        if set.truncated {
            self.diagnostics.record(&LinkscoutError::ProviderLimitReached {
                provider: provider.name().to_string(),
                domain: domain.to_string(),
                limit: cap,
            });
        }
        info!(
            "{} {} for {}: {} domains{}",
            provider.name(),
            direction.as_str(),
            domain,
            set.neighbors.len(),
            if set.truncated { " (capped)" } else { "" }
        );
        Ok(Arc::new(set))
    }

    async fn fetch_count(&self, domain: &str) -> Result<u64> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        let provider = self.provider.clone();
        let outcome = self
            .gate
            .run(
                provider.name(),
                tokio::time::timeout(self.timeout, provider.outlink_count(domain)),
            )
            .await;

        match outcome {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(e)) => Err(self.unavailable(domain, e.to_string())),
            Err(_) => Err(self.unavailable(domain, format!("timed out after {:?}", self.timeout))),
        }
    }
}

fn to_backlink_edge(edge: &LinkEdge, referrer: String, target: String) -> BacklinkEdge {
    BacklinkEdge {
        referrer,
        target,
        anchor: edge.anchor.clone(),
        context_before: edge.context_before.clone(),
        context_after: edge.context_after.clone(),
        html: edge.html.clone(),
        nofollow: edge.nofollow,
        first_seen: edge.first_seen,
    }
}

/// Normalize a provider page. Self-links and unparseable domains are dropped.
pub fn build_link_set(direction: Direction, domain: &str, page: LinkPage, cap: usize) -> LinkSet {
    let truncated = page.truncated || page.edges.len() >= cap;
    let mut neighbors = BTreeSet::new();
    let mut edges = Vec::new();
    let mut dropped = 0usize;

    for edge in &page.edges {
        let raw_other = match direction {
            Direction::Referrers => &edge.source,
            Direction::Outlinks => &edge.target,
        };
        let Ok(other) = normalize_domain(raw_other) else {
            dropped += 1;
            continue;
        };
        if other == domain {
            continue;
        }
        neighbors.insert(other.clone());
        edges.push(match direction {
            Direction::Referrers => to_backlink_edge(edge, other, domain.to_string()),
            Direction::Outlinks => to_backlink_edge(edge, domain.to_string(), other),
        });
    }

    if dropped > 0 {
        debug!("Dropped {} unparseable domains for {}", dropped, domain);
    }

    LinkSet {
        domain: domain.to_string(),
        direction,
        neighbors,
        edges,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_link_set_normalizes_and_drops_self_links() {
        let page = LinkPage {
            edges: vec![
                LinkEdge::new("https://www.A.com/page", "example.com"),
                LinkEdge::new("a.com", "example.com"),
                LinkEdge::new("example.com", "example.com"),
                LinkEdge::new("not a host", "example.com"),
                LinkEdge::new("b.com", "example.com").with_anchor("B"),
            ],
            truncated: false,
        };

        let set = build_link_set(Direction::Referrers, "example.com", page, 100);

        assert_eq!(
            set.neighbors.iter().cloned().collect::<Vec<_>>(),
            vec!["a.com".to_string(), "b.com".to_string()]
        );
        assert_eq!(set.edges.len(), 3);
        assert_eq!(set.edges[2].anchor.as_deref(), Some("B"));
        assert!(!set.truncated);
    }

    #[test]
    fn test_build_link_set_flags_cap() {
        let page = LinkPage {
            edges: vec![
                LinkEdge::new("example.com", "x.com"),
                LinkEdge::new("example.com", "y.com"),
            ],
            truncated: false,
        };
        let set = build_link_set(Direction::Outlinks, "example.com", page, 2);
        assert!(set.truncated);
        assert_eq!(set.edges[0].referrer, "example.com");
        assert_eq!(set.edges[0].target, "x.com");
    }
}

use crate::cache::BacklinkGraphClient;
use crate::domain::{Blacklist, normalize_domain};
use crate::error::Result;
use crate::model::{SharedDomain, TwiceRemovedPath, TwiceRemovedSummary};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Limits for the shared-neighbor algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedLinkParams {
    pub min_shared: usize,
    pub max_referrers: usize,
    pub max_outlinks_per_referrer: usize,
}

impl Default for SharedLinkParams {
    fn default() -> Self {
        Self {
            min_shared: 2,
            max_referrers: 100,
            max_outlinks_per_referrer: 200,
        }
    }
}

/// Count, for every candidate domain, the distinct seeds whose neighbor set
/// contains it.
///
/// The target, blacklisted domains and a seed's own domain never count.
/// Candidates seen by fewer than `min_shared` seeds are dropped; the rest are
/// sorted by count (desc) then name.
pub fn count_shared(
    target: &str,
    neighbor_sets: &[(String, BTreeSet<String>)],
    blacklist: &Blacklist,
    min_shared: usize,
) -> Vec<SharedDomain> {
    let mut seen_by: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for (seed, neighbors) in neighbor_sets {
        for candidate in neighbors {
            if candidate == target || candidate == seed || blacklist.contains(candidate) {
                continue;
            }
            seen_by
                .entry(candidate.as_str())
                .or_default()
                .insert(seed.as_str());
        }
    }

    let mut shared: Vec<SharedDomain> = seen_by
        .into_iter()
        .filter(|(_, seeds)| seeds.len() >= min_shared.max(1))
        .map(|(domain, seeds)| SharedDomain {
            domain: domain.to_string(),
            count: seeds.len(),
            via: seeds.into_iter().map(str::to_string).collect(),
        })
        .collect();
    shared.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    shared
}

/// Group twice-removed paths by second-level domain, most paths first.
pub fn summarize_twice_removed(paths: &[TwiceRemovedPath]) -> Vec<TwiceRemovedSummary> {
    let mut grouped: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for path in paths {
        grouped
            .entry(path.domain.as_str())
            .or_default()
            .insert(path.via.as_str());
    }

    let mut summaries: Vec<TwiceRemovedSummary> = grouped
        .into_iter()
        .map(|(domain, via)| TwiceRemovedSummary {
            domain: domain.to_string(),
            paths: via.len(),
            via: via.into_iter().map(str::to_string).collect(),
        })
        .collect();
    summaries.sort_by(|a, b| b.paths.cmp(&a.paths).then_with(|| a.domain.cmp(&b.domain)));
    summaries
}

/// Graph algorithms over the run's backlink cache.
pub struct GraphAnalyzer {
    client: Arc<BacklinkGraphClient>,
    blacklist: Arc<Blacklist>,
}

impl GraphAnalyzer {
    pub fn new(client: Arc<BacklinkGraphClient>, blacklist: Arc<Blacklist>) -> Self {
        Self { client, blacklist }
    }

    pub fn client(&self) -> &BacklinkGraphClient {
        &self.client
    }

    /// Referrers of `target` without blacklisted domains, at most `limit`.
    async fn seed_referrers(&self, target: &str, limit: usize) -> Result<BTreeSet<String>> {
        let referrers = self.client.get_referrers(target, usize::MAX).await?;
        Ok(referrers
            .into_iter()
            .filter(|r| !self.blacklist.contains(r))
            .take(limit)
            .collect())
    }

    /// Outlink sets of every seed. Failed or cancelled fetches are skipped; the
    /// failures are already in the diagnostics.
    async fn outlink_sets(
        &self,
        seeds: &BTreeSet<String>,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<(String, BTreeSet<String>)> {
        let fetches = seeds.iter().map(|seed| async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outlinks = self.client.get_outlinks(seed, limit) => {
                    outlinks.ok().map(|set| (seed.clone(), set))
                }
            }
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }

    async fn shared_outlinks(
        &self,
        target: &str,
        params: &SharedLinkParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<SharedDomain>> {
        let target = normalize_domain(target)?;
        let seeds = self.seed_referrers(&target, params.max_referrers).await?;
        debug!("{} has {} usable referrers", target, seeds.len());

        let sets = self
            .outlink_sets(&seeds, params.max_outlinks_per_referrer, cancel)
            .await;
        Ok(count_shared(&target, &sets, &self.blacklist, params.min_shared))
    }

    /// Domains that the target's referrers also link to, with at least
    /// `min_shared` referrers in common.
    pub async fn similar_profile(
        &self,
        target: &str,
        params: &SharedLinkParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<SharedDomain>> {
        let shared = self.shared_outlinks(target, params, cancel).await?;
        info!("Similar profile for {}: {} domains", target, shared.len());
        Ok(shared)
    }

    /// Domains co-promoted with the target by the same referrers.
    pub async fn co_linked(
        &self,
        target: &str,
        params: &SharedLinkParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<SharedDomain>> {
        let shared = self.shared_outlinks(target, params, cancel).await?;
        info!("Co-linked with {}: {} domains", target, shared.len());
        Ok(shared)
    }

    /// Referrers of referrers: `(d2, d1, target)` paths two hops away.
    ///
    /// `d2` is never the target, a first-level referrer, its own `d1`, or
    /// blacklisted. Blacklisted first-level domains are not used as hops.
    pub async fn twice_removed(
        &self,
        target: &str,
        max_referrers: usize,
        max_second_level: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<TwiceRemovedPath>> {
        let target = normalize_domain(target)?;
        let first_level = self.client.get_referrers(&target, usize::MAX).await?;
        let hops: Vec<&String> = first_level
            .iter()
            .filter(|d| !self.blacklist.contains(d))
            .take(max_referrers)
            .collect();

        let fetches = hops.iter().map(|d1| async move {
            let second = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                second = self.seed_referrers(d1, max_second_level) => second.ok()?,
            };
            Some((d1.to_string(), second))
        });

        let mut paths: Vec<TwiceRemovedPath> = join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .flat_map(|(d1, second)| {
                second
                    .into_iter()
                    .filter(|d2| *d2 != target && *d2 != d1 && !first_level.contains(d2))
                    .map(|d2| TwiceRemovedPath {
                        domain: d2,
                        via: d1.clone(),
                        target: target.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        paths.sort();

        info!(
            "Twice-removed for {}: {} paths through {} referrers",
            target,
            paths.len(),
            hops.len()
        );
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(domains: &[&str]) -> BTreeSet<String> {
        domains.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_count_shared_respects_min_shared() {
        let sets = vec![
            ("a.com".to_string(), set(&["x.com", "z.com"])),
            ("b.com".to_string(), set(&["x.com"])),
            ("c.com".to_string(), set(&["y.com", "z.com"])),
        ];
        let blacklist = Blacklist::default();

        let two = count_shared("example.com", &sets, &blacklist, 2);
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].domain, "x.com");
        assert_eq!(two[0].via, vec!["a.com".to_string(), "b.com".to_string()]);
        assert_eq!(two[1].domain, "z.com");

        assert!(count_shared("example.com", &sets, &blacklist, 3).is_empty());
    }

    #[test]
    fn test_count_shared_excludes_target_self_and_blacklist() {
        let sets = vec![
            ("a.com".to_string(), set(&["example.com", "a.com", "spam.com", "x.com"])),
            ("b.com".to_string(), set(&["example.com", "a.com", "sub.spam.com", "x.com"])),
        ];
        let blacklist = Blacklist::new(["spam.com"]);

        let shared = count_shared("example.com", &sets, &blacklist, 1);
        let names: Vec<&str> = shared.iter().map(|s| s.domain.as_str()).collect();
        assert_eq!(names, vec!["x.com", "a.com"]);
        assert_eq!(shared[1].count, 1);
    }

    #[test]
    fn test_summarize_twice_removed() {
        let path = |d2: &str, d1: &str| TwiceRemovedPath {
            domain: d2.to_string(),
            via: d1.to_string(),
            target: "example.com".to_string(),
        };
        let summary = summarize_twice_removed(&[
            path("q.com", "a.com"),
            path("p.com", "a.com"),
            path("p.com", "b.com"),
        ]);

        assert_eq!(summary[0].domain, "p.com");
        assert_eq!(summary[0].paths, 2);
        assert_eq!(summary[1].domain, "q.com");
    }
}

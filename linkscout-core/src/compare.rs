use crate::authority::authority_score;
use crate::cache::BacklinkGraphClient;
use crate::domain::{Blacklist, normalize_domain};
use crate::error::{LinkscoutError, Result};
use crate::model::{AnnotatedDomain, ComparisonResult};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Normalize, dedupe and sort comparison inputs.
pub fn prepare_domains<S: AsRef<str>>(domains: &[S]) -> Result<Vec<String>> {
    let set: BTreeSet<String> = domains
        .iter()
        .map(|d| normalize_domain(d.as_ref()))
        .collect::<Result<_>>()?;
    if set.len() < 2 {
        return Err(LinkscoutError::InsufficientDomains(set.len()));
    }
    Ok(set.into_iter().collect())
}

/// Intersection of every set; empty when any input set is empty.
pub fn intersect_all(sets: &[BTreeSet<String>]) -> BTreeSet<String> {
    let Some((first, rest)) = sets.split_first() else {
        return BTreeSet::new();
    };
    rest.iter().fold(first.clone(), |acc, next| {
        acc.intersection(next).cloned().collect()
    })
}

/// Common backlinks and common outlinks of two or more domains.
pub struct DomainComparator {
    client: Arc<BacklinkGraphClient>,
    blacklist: Arc<Blacklist>,
}

impl DomainComparator {
    pub fn new(client: Arc<BacklinkGraphClient>, blacklist: Arc<Blacklist>) -> Self {
        Self { client, blacklist }
    }

    /// Compare `domains`, fetching at most `link_cap` links per domain and
    /// direction. A domain whose fetch fails contributes an empty set.
    pub async fn compare<S: AsRef<str>>(
        &self,
        domains: &[S],
        link_cap: usize,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResult> {
        let domains = prepare_domains(domains)?;

        let fetches = domains.iter().map(|domain| async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => (BTreeSet::new(), BTreeSet::new()),
                (referrers, outlinks) = async {
                    tokio::join!(
                        self.client.get_referrers(domain, link_cap),
                        self.client.get_outlinks(domain, link_cap),
                    )
                } => (referrers.unwrap_or_default(), outlinks.unwrap_or_default()),
            }
        });
        let (referrer_sets, outlink_sets): (Vec<_>, Vec<_>) =
            join_all(fetches).await.into_iter().unzip();

        let common_backlinks: Vec<String> = intersect_all(&referrer_sets)
            .into_iter()
            .filter(|d| !self.blacklist.contains(d))
            .collect();
        let common_outlinks: Vec<String> = intersect_all(&outlink_sets)
            .into_iter()
            .filter(|d| !self.blacklist.contains(d) && !domains.contains(d))
            .collect();

        info!(
            "Compared {} domains: {} common backlinks, {} common outlinks",
            domains.len(),
            common_backlinks.len(),
            common_outlinks.len()
        );

        let (common_backlinks, common_outlinks) = tokio::join!(
            self.annotate(common_backlinks, cancel),
            self.annotate(common_outlinks, cancel),
        );

        Ok(ComparisonResult {
            domains,
            common_backlinks,
            common_outlinks,
        })
    }

    /// Attach outlink count and authority; a failed lookup leaves both empty.
    pub async fn annotate(
        &self,
        domains: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<AnnotatedDomain> {
        let lookups = domains.into_iter().map(|domain| async move {
            let outlink_count = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                count = self.client.get_outlink_count(&domain) => count.ok(),
            };
            AnnotatedDomain {
                authority: outlink_count.map(authority_score),
                outlink_count,
                domain,
            }
        });
        join_all(lookups).await
    }
}

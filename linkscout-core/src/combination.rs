use crate::model::{Combination, Entity};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::debug;

/// Combination sizes, largest (strongest evidence) first.
pub const TIERS: [usize; 3] = [5, 3, 2];
pub const DEFAULT_SAMPLING_THRESHOLD: usize = 12;
pub const DEFAULT_MAX_PER_TIER: usize = 40;

/// A rendered `site:` query for one combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchQuery {
    pub domain: String,
    pub combination: Combination,
    pub text: String,
}

impl SearchQuery {
    pub fn new(domain: &str, combination: Combination) -> Self {
        Self {
            text: combination.query(domain),
            domain: domain.to_string(),
            combination,
        }
    }
}

/// Number of k-subsets of an n-set, `None` on overflow.
pub fn binomial(n: usize, k: usize) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = result.checked_mul((n - i) as u128)? / (i as u128 + 1);
    }
    Some(result)
}

/// Seed derived from the first eight bytes of SHA-256 of the domain.
pub fn domain_seed(domain: &str) -> u64 {
    let digest = Sha256::digest(domain.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Every k-subset of `0..n` as sorted index vectors, in lexicographic order.
fn all_index_subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        let Some(pos) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
            break;
        };
        idx[pos] += 1;
        for j in pos + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
    out
}

/// Up to `max` distinct k-subsets of `0..n`, drawn with a seeded generator.
fn sampled_index_subsets(n: usize, k: usize, max: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut picked: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut pool: Vec<usize> = (0..n).collect();
    let max_attempts = max.saturating_mul(20).max(100);

    for _ in 0..max_attempts {
        if picked.len() >= max {
            break;
        }
        rng.shuffle(&mut pool);
        let mut subset: Vec<usize> = pool[..k].to_vec();
        subset.sort_unstable();
        picked.insert(subset);
    }
    picked.into_iter().collect()
}

/// Builds weighted entity combinations for a domain.
#[derive(Debug, Clone)]
pub struct CombinationGenerator {
    sampling_threshold: usize,
    max_per_tier: usize,
}

impl Default for CombinationGenerator {
    fn default() -> Self {
        Self {
            sampling_threshold: DEFAULT_SAMPLING_THRESHOLD,
            max_per_tier: DEFAULT_MAX_PER_TIER,
        }
    }
}

impl CombinationGenerator {
    pub fn new(sampling_threshold: usize, max_per_tier: usize) -> Self {
        Self {
            sampling_threshold,
            max_per_tier: max_per_tier.max(1),
        }
    }

    /// Combinations of size 5, 3 and 2 (tiers that do not fit are skipped),
    /// largest tier first.
    ///
    /// With more than `sampling_threshold` entities a tier is sampled down to
    /// `max_per_tier` combinations using a seed derived from `domain`, unless
    /// the whole tier already fits.
    pub fn generate(&self, domain: &str, entities: &[Entity]) -> Vec<Combination> {
        let mut names: Vec<&Entity> = entities.iter().collect();
        names.sort_by(|a, b| a.key.cmp(&b.key));
        names.dedup_by(|a, b| a.key == b.key);
        let n = names.len();
        let seed = domain_seed(domain);

        let mut combinations = Vec::new();
        for k in TIERS {
            if k > n {
                continue;
            }
            let full = binomial(n, k);
            let enumerate = n <= self.sampling_threshold
                || full.is_some_and(|c| c <= self.max_per_tier as u128);

            let subsets = if enumerate {
                all_index_subsets(n, k)
            } else {
                debug!(
                    "Sampling {} of C({}, {}) combinations for {}",
                    self.max_per_tier, n, k, domain
                );
                sampled_index_subsets(n, k, self.max_per_tier, seed.wrapping_add(k as u64))
            };

            combinations.extend(
                subsets
                    .into_iter()
                    .map(|subset| Combination::new(subset.into_iter().map(|i| names[i].name.clone()))),
            );
        }
        combinations
    }

    pub fn queries(&self, domain: &str, entities: &[Entity]) -> Vec<SearchQuery> {
        self.generate(domain, entities)
            .into_iter()
            .map(|combination| SearchQuery::new(domain, combination))
            .collect()
    }
}

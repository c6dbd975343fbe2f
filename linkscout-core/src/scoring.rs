use crate::domain::domain_of_url;
use crate::model::{Combination, ScoredUrl};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};
use url::Url;

pub const DEFAULT_TOP_K: usize = 50;

#[derive(Debug, Default)]
struct Accumulated {
    snippet: Option<String>,
    combinations: BTreeSet<Combination>,
    engines: BTreeSet<String>,
}

/// Merge key for a hit URL: the URL with its fragment removed.
pub fn url_key(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

fn by_weight(combinations: &BTreeSet<Combination>) -> Vec<Combination> {
    let mut sorted: Vec<Combination> = combinations.iter().cloned().collect();
    sorted.sort_by(|a, b| b.weight().cmp(&a.weight()).then_with(|| a.cmp(b)));
    sorted
}

/// Thread-safe accumulator of (url, combination, engine) matches.
///
/// A URL's score is the sum of the weights of the distinct combinations that
/// matched it; seeing the same combination from several engines does not add
/// to it.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    entries: Mutex<HashMap<String, Accumulated>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, snippet: Option<&str>, combination: &Combination, engine: &str) {
        let key = url_key(url);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key).or_default();
        if entry.snippet.is_none() {
            entry.snippet = snippet.map(str::to_string);
        }
        entry.combinations.insert(combination.clone());
        entry.engines.insert(engine.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top `top_k` URLs by score desc, engine count desc, URL asc.
    pub fn ranked(&self, top_k: usize) -> Vec<ScoredUrl> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut scored: Vec<ScoredUrl> = entries
            .iter()
            .map(|(url, acc)| ScoredUrl {
                url: url.clone(),
                domain: domain_of_url(url).unwrap_or_default(),
                snippet: acc.snippet.clone(),
                score: acc.combinations.iter().map(Combination::weight).sum(),
                combinations: by_weight(&acc.combinations),
                engines: acc.engines.iter().cloned().collect(),
            })
            .collect();
        drop(entries);

        scored.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.engines.len().cmp(&a.engines.len()))
                .then_with(|| a.url.cmp(&b.url))
        });
        scored.truncate(top_k);
        scored
    }
}

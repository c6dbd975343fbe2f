// In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use linkscout_core::cache::BacklinkGraphClient;
use linkscout_core::diagnostics::Diagnostics;
use linkscout_scanner::{
    ContentSource, LinkEdge, LinkPage, LinkProvider, NerService, RawEntity, RequestGate, SearchEngine,
    SearchHit, SourceError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Link provider backed by plain maps, counting every call.
#[derive(Default)]
pub struct MapProvider {
    referrers: HashMap<String, Vec<LinkEdge>>,
    outlinks: HashMap<String, Vec<String>>,
    counts: HashMap<String, u64>,
    failing: HashSet<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MapProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn referrers(mut self, domain: &str, referrers: &[&str]) -> Self {
        self.referrers.insert(
            domain.to_string(),
            referrers.iter().map(|r| LinkEdge::new(*r, domain)).collect(),
        );
        self
    }

    pub fn referrer_edges(mut self, domain: &str, edges: Vec<LinkEdge>) -> Self {
        self.referrers.insert(domain.to_string(), edges);
        self
    }

    pub fn outlinks(mut self, domain: &str, outlinks: &[&str]) -> Self {
        self.outlinks.insert(
            domain.to_string(),
            outlinks.iter().map(|o| o.to_string()).collect(),
        );
        self
    }

    pub fn count(mut self, domain: &str, count: u64) -> Self {
        self.counts.insert(domain.to_string(), count);
        self
    }

    pub fn failing(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, domain: &str) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(domain) {
            return Err(SourceError::Status {
                endpoint: format!("map/{}", domain),
                status: 503,
            });
        }
        Ok(())
    }
}

fn page(mut edges: Vec<LinkEdge>, limit: usize) -> LinkPage {
    let truncated = edges.len() > limit;
    edges.truncate(limit);
    LinkPage { edges, truncated }
}

#[async_trait]
impl LinkProvider for MapProvider {
    fn name(&self) -> &str {
        "map"
    }

    async fn referrers(&self, domain: &str, limit: usize) -> linkscout_scanner::error::Result<LinkPage> {
        self.enter(domain).await?;
        Ok(page(self.referrers.get(domain).cloned().unwrap_or_default(), limit))
    }

    async fn outlinks(&self, domain: &str, limit: usize) -> linkscout_scanner::error::Result<LinkPage> {
        self.enter(domain).await?;
        let edges = self
            .outlinks
            .get(domain)
            .map(|targets| targets.iter().map(|t| LinkEdge::new(domain, t.clone())).collect())
            .unwrap_or_default();
        Ok(page(edges, limit))
    }

    async fn outlink_count(&self, domain: &str) -> linkscout_scanner::error::Result<u64> {
        self.enter(domain).await?;
        Ok(self.counts.get(domain).copied().unwrap_or(0))
    }
}

/// Returns the same hits for every query.
pub struct StaticEngine {
    name: String,
    hits: Vec<SearchHit>,
    pub calls: AtomicUsize,
}

impl StaticEngine {
    pub fn new(name: &str, urls: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            hits: urls.iter().map(|u| SearchHit::new(*u)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchEngine for StaticEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> linkscout_scanner::error::Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.clone())
    }
}

/// Never answers within any sane timeout.
pub struct HangingEngine {
    name: String,
    pub calls: AtomicUsize,
}

impl HangingEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchEngine for HangingEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> linkscout_scanner::error::Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// NER service with canned mentions per domain, counting every call.
pub struct ScriptedNer {
    name: String,
    entities: HashMap<String, Vec<RawEntity>>,
    failing: HashSet<String>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl ScriptedNer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entities: HashMap::new(),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn entities(mut self, domain: &str, mentions: &[(&str, &str, f32)]) -> Self {
        self.entities.insert(
            domain.to_string(),
            mentions
                .iter()
                .map(|(name, label, confidence)| RawEntity::new(*name, *label, *confidence))
                .collect(),
        );
        self
    }

    pub fn failing(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NerService for ScriptedNer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, _text: &str, domain: &str) -> linkscout_scanner::error::Result<Vec<RawEntity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(domain) {
            return Err(SourceError::Status {
                endpoint: format!("{}/{}", self.name, domain),
                status: 502,
            });
        }
        Ok(self.entities.get(domain).cloned().unwrap_or_default())
    }
}

/// Serves page text after a fixed delay.
pub struct SlowContent {
    pages: HashMap<String, String>,
    delay: Duration,
}

impl SlowContent {
    pub fn new(delay: Duration) -> Self {
        Self {
            pages: HashMap::new(),
            delay,
        }
    }

    pub fn page(mut self, domain: &str, text: &str) -> Self {
        self.pages.insert(domain.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl ContentSource for SlowContent {
    fn name(&self) -> &str {
        "slow-pages"
    }

    async fn fetch_text(&self, domain: &str) -> linkscout_scanner::error::Result<String> {
        tokio::time::sleep(self.delay).await;
        self.pages
            .get(domain)
            .cloned()
            .ok_or_else(|| SourceError::Other(format!("no page for {}", domain)))
    }
}

pub fn client_for(provider: Arc<MapProvider>, diagnostics: &Diagnostics) -> Arc<BacklinkGraphClient> {
    Arc::new(
        BacklinkGraphClient::new(
            provider,
            Arc::new(RequestGate::new(Duration::ZERO)),
            diagnostics.clone(),
        )
        .with_timeout(Duration::from_secs(5))
        .with_link_cap(100),
    )
}

/// Scenario: three referrers of example.com; a and b both link to x.com, c links to y.com.
pub fn scenario_a() -> MapProvider {
    MapProvider::new()
        .referrers("example.com", &["a.com", "b.com", "c.com"])
        .outlinks("a.com", &["x.com", "example.com"])
        .outlinks("b.com", &["x.com", "example.com"])
        .outlinks("c.com", &["y.com", "example.com"])
}

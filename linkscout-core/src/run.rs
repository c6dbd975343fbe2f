use crate::anchors::AnchorContextExtractor;
use crate::cache::BacklinkGraphClient;
use crate::combination::CombinationGenerator;
use crate::compare::DomainComparator;
use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::domain::{Blacklist, normalize_domain};
use crate::entity::EntityExtractor;
use crate::error::{LinkscoutError, Result};
use crate::graph::{GraphAnalyzer, summarize_twice_removed};
use crate::model::DomainProfile;
use crate::report::{
    AnchorResult, EntitySearchResult, Findings, Report, SharedDomainsResult, TwiceRemovedResult,
};
use crate::scoring::ResultAggregator;
use crate::search::SearchOrchestrator;
use futures::future::join_all;
use linkscout_scanner::{
    ContentSource, FixtureSet, LinkProvider, NerService, RequestGate, SearchEngine,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a run looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Entity co-occurrence search over weighted name combinations
    CombinationSearch,
    /// Domains linked by the same referrers as the target
    SimilarProfile,
    /// Domains co-promoted with the target
    CoLinked,
    /// Referrers of referrers
    TwiceRemoved,
    /// Common backlinks and outlinks of several domains
    Compare,
    /// Anchor text and surrounding context of inbound links
    Anchors,
}

impl Mode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "search" | "combination-search" => Some(Mode::CombinationSearch),
            "similar" | "similar-profile" => Some(Mode::SimilarProfile),
            "colinked" | "co-linked" => Some(Mode::CoLinked),
            "twice-removed" | "twice" => Some(Mode::TwiceRemoved),
            "compare" => Some(Mode::Compare),
            "anchors" => Some(Mode::Anchors),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::CombinationSearch => "combination-search",
            Mode::SimilarProfile => "similar-profile",
            Mode::CoLinked => "co-linked",
            Mode::TwiceRemoved => "twice-removed",
            Mode::Compare => "compare",
            Mode::Anchors => "anchors",
        }
    }

    pub fn needs_link_provider(&self) -> bool {
        !matches!(self, Mode::CombinationSearch)
    }
}

/// The external collaborators available to a run.
#[derive(Clone, Default)]
pub struct Sources {
    pub provider: Option<Arc<dyn LinkProvider>>,
    pub engines: Vec<Arc<dyn SearchEngine>>,
    pub ner: Option<Arc<dyn NerService>>,
    pub content: Option<Arc<dyn ContentSource>>,
}

impl Sources {
    /// Serve every source from one fixture set.
    pub fn from_fixtures(fixtures: &Arc<FixtureSet>) -> Self {
        Self {
            provider: Some(Arc::new(fixtures.link_provider("fixtures"))),
            engines: fixtures
                .engine_names()
                .iter()
                .map(|name| Arc::new(fixtures.search_engine(name)) as Arc<dyn SearchEngine>)
                .collect(),
            ner: Some(Arc::new(fixtures.ner_service())),
            content: Some(Arc::new(fixtures.content_source())),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LinkProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn with_ner(mut self, ner: Arc<dyn NerService>) -> Self {
        self.ner = Some(ner);
        self
    }

    pub fn with_content(mut self, content: Arc<dyn ContentSource>) -> Self {
        self.content = Some(content);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub mode: Mode,
    pub targets: Vec<String>,
    /// Anchors mode: only edges from this referrer.
    pub referrer: Option<String>,
    /// Anchors mode: case-insensitive filter over anchor text and context.
    pub term: Option<String>,
}

impl RunRequest {
    pub fn new<I, S>(mode: Mode, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            targets: targets.into_iter().map(Into::into).collect(),
            referrer: None,
            term: None,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }
}

/// Callback for reporting run progress
pub type RunProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Fail before any work if the selected mode has nothing to talk to.
pub fn check_sources(mode: Mode, sources: &Sources) -> Result<()> {
    if mode.needs_link_provider() {
        if sources.provider.is_none() {
            return Err(LinkscoutError::Config(format!(
                "{} needs a link provider (sources.provider or sources.fixtures)",
                mode.as_str()
            )));
        }
        return Ok(());
    }

    if sources.engines.is_empty() {
        return Err(LinkscoutError::Config(
            "combination search needs at least one search engine".to_string(),
        ));
    }
    if sources.ner.is_none() {
        return Err(LinkscoutError::Config(
            "combination search needs an entity extraction service".to_string(),
        ));
    }
    if sources.content.is_none() {
        return Err(LinkscoutError::Config(
            "combination search needs a content source".to_string(),
        ));
    }
    Ok(())
}

/// Normalize and dedupe targets, keeping input order. Invalid entries are
/// recorded and skipped; no valid target at all is an error.
fn normalize_targets(targets: &[String], diagnostics: &Diagnostics) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::new();
    for target in targets {
        match normalize_domain(target) {
            Ok(domain) => {
                if !normalized.contains(&domain) {
                    normalized.push(domain);
                }
            }
            Err(e) => diagnostics.record(&e),
        }
    }
    if normalized.is_empty() {
        return Err(LinkscoutError::InvalidDomain(targets.join(", ")));
    }
    Ok(normalized)
}

/// Resolve `future` unless the token fires first. The future is polled first
/// so work that already finished is not thrown away.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        output = future => Some(output),
        _ = cancel.cancelled() => None,
    }
}

fn empty_profile(domain: &str, blacklist: &Blacklist) -> DomainProfile {
    DomainProfile {
        domain: domain.to_string(),
        referrers: Vec::new(),
        outlinks: Vec::new(),
        outlink_count: None,
        authority: None,
        blacklisted: blacklist.contains(domain),
    }
}

struct RunContext<'a> {
    config: &'a RunConfig,
    gate: Arc<RequestGate>,
    diagnostics: Diagnostics,
    blacklist: Arc<Blacklist>,
    cancel: CancellationToken,
    progress: Option<RunProgressCallback>,
}

impl RunContext<'_> {
    fn report_progress(&self, message: String) {
        if let Some(ref callback) = self.progress {
            callback(message);
        }
    }

    fn link_client(&self, provider: Arc<dyn LinkProvider>) -> Arc<BacklinkGraphClient> {
        Arc::new(
            BacklinkGraphClient::new(provider, self.gate.clone(), self.diagnostics.clone())
                .with_timeout(self.config.request_timeout())
                .with_link_cap(self.config.link_cap),
        )
    }

    async fn profile(&self, client: &BacklinkGraphClient, domain: &str) -> DomainProfile {
        until_cancelled(&self.cancel, client.profile(domain, &self.blacklist))
            .await
            .and_then(|profile| profile.ok())
            .unwrap_or_else(|| empty_profile(domain, &self.blacklist))
    }

    async fn fetch_content(&self, content: &dyn ContentSource, domain: &str) -> Option<String> {
        let timeout = self.config.request_timeout();
        let key = format!("{}:{}", content.name(), domain);
        let call = self
            .gate
            .run(&key, tokio::time::timeout(timeout, content.fetch_text(domain)));

        let reason = match until_cancelled(&self.cancel, call).await? {
            Ok(Ok(text)) => return Some(text),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", timeout),
        };
        self.diagnostics.record(&LinkscoutError::ContentUnavailable {
            service: content.name().to_string(),
            domain: domain.to_string(),
            reason,
        });
        None
    }

    async fn combination_search(&self, targets: &[String], sources: &Sources) -> Findings {
        let (Some(ner), Some(content)) = (sources.ner.clone(), sources.content.clone()) else {
            return Findings::CombinationSearch(Vec::new());
        };
        let timeout = self.config.request_timeout();
        let extractor = EntityExtractor::new(ner, self.gate.clone(), self.diagnostics.clone())
            .with_timeout(timeout)
            .with_threshold(self.config.confidence_threshold);
        let generator =
            CombinationGenerator::new(self.config.sampling_threshold, self.config.max_per_tier);
        let orchestrator = SearchOrchestrator::new(
            sources.engines.clone(),
            self.gate.clone(),
            self.diagnostics.clone(),
        )
        .with_timeout(timeout);

        // Each domain runs content -> NER -> search on its own; the gate keeps
        // every engine serialized across domains.
        let pipelines = targets.iter().enumerate().map(|(idx, domain)| {
            let (extractor, generator, orchestrator) = (&extractor, &generator, &orchestrator);
            let content = content.clone();
            async move {
                if self.cancel.is_cancelled() {
                    return None;
                }
                self.report_progress(format!(
                    "Extracting entities for {} ({}/{})",
                    domain,
                    idx + 1,
                    targets.len()
                ));

                let mut result = EntitySearchResult {
                    domain: domain.clone(),
                    entities: Vec::new(),
                    queries: 0,
                    results: Vec::new(),
                };

                let Some(text) = self.fetch_content(content.as_ref(), domain).await else {
                    return Some(result);
                };
                let Some(Ok(entities)) =
                    until_cancelled(&self.cancel, extractor.extract(domain, &text)).await
                else {
                    return Some(result);
                };

                let queries = generator.queries(domain, &entities);
                self.report_progress(format!(
                    "Searching {} combinations for {} across {} engines",
                    queries.len(),
                    domain,
                    orchestrator.available_engines()
                ));
                let aggregator = ResultAggregator::new();
                orchestrator.dispatch(&queries, &aggregator, &self.cancel).await;

                result.entities = entities;
                result.queries = queries.len();
                result.results = aggregator.ranked(self.config.top_k);
                Some(result)
            }
        });

        let results = join_all(pipelines).await.into_iter().flatten().collect();
        Findings::CombinationSearch(results)
    }

    async fn shared_domains(
        &self,
        mode: Mode,
        targets: &[String],
        client: Arc<BacklinkGraphClient>,
    ) -> Findings {
        let analyzer = GraphAnalyzer::new(client.clone(), self.blacklist.clone());
        let params = self.config.shared_link_params();

        let mut results = Vec::new();
        for domain in targets {
            if self.cancel.is_cancelled() {
                break;
            }
            self.report_progress(format!("Analyzing link profile of {}", domain));

            let analysis = async {
                if mode == Mode::CoLinked {
                    analyzer.co_linked(domain, &params, &self.cancel).await
                } else {
                    analyzer.similar_profile(domain, &params, &self.cancel).await
                }
            };
            let (target, domains) = tokio::join!(
                self.profile(&client, domain),
                until_cancelled(&self.cancel, analysis),
            );
            results.push(SharedDomainsResult {
                target,
                domains: domains.and_then(|d| d.ok()).unwrap_or_default(),
            });
        }

        if mode == Mode::CoLinked {
            Findings::CoLinked(results)
        } else {
            Findings::SimilarProfile(results)
        }
    }

    async fn twice_removed(&self, targets: &[String], client: Arc<BacklinkGraphClient>) -> Findings {
        let analyzer = GraphAnalyzer::new(client.clone(), self.blacklist.clone());

        let mut results = Vec::new();
        for domain in targets {
            if self.cancel.is_cancelled() {
                break;
            }
            self.report_progress(format!("Walking referrers of referrers for {}", domain));

            let (target, paths) = tokio::join!(
                self.profile(&client, domain),
                until_cancelled(
                    &self.cancel,
                    analyzer.twice_removed(
                        domain,
                        self.config.max_referrers,
                        self.config.max_second_level,
                        &self.cancel,
                    ),
                ),
            );
            let paths = paths.and_then(|p| p.ok()).unwrap_or_default();
            results.push(TwiceRemovedResult {
                target,
                summary: summarize_twice_removed(&paths),
                paths,
            });
        }
        Findings::TwiceRemoved(results)
    }

    async fn compare(&self, targets: &[String], client: Arc<BacklinkGraphClient>) -> Result<Findings> {
        self.report_progress(format!("Comparing {} domains", targets.len()));
        let comparator = DomainComparator::new(client, self.blacklist.clone());
        let comparison = comparator
            .compare(targets, self.config.link_cap, &self.cancel)
            .await?;
        Ok(Findings::Compare(Box::new(comparison)))
    }

    async fn anchors(
        &self,
        targets: &[String],
        request: &RunRequest,
        client: Arc<BacklinkGraphClient>,
    ) -> Result<Findings> {
        let referrer = request
            .referrer
            .as_deref()
            .map(normalize_domain)
            .transpose()?;
        let extractor = AnchorContextExtractor::new(client, self.blacklist.clone())
            .with_window(self.config.context_window);

        let mut results = Vec::new();
        for domain in targets {
            if self.cancel.is_cancelled() {
                break;
            }
            self.report_progress(format!("Collecting anchors pointing at {}", domain));
            let anchors = until_cancelled(
                &self.cancel,
                extractor.extract(domain, referrer.as_deref(), request.term.as_deref()),
            )
            .await
            .and_then(|a| a.ok())
            .unwrap_or_default();

            results.push(AnchorResult {
                target: domain.clone(),
                referrer: referrer.clone(),
                term: request.term.clone(),
                anchors,
            });
        }
        Ok(Findings::Anchors(results))
    }
}

/// Execute one run and build its report.
///
/// Only configuration problems and unusable input are returned as errors, and
/// both are detected before any external call. Everything else ends up in
/// the report's diagnostics. A cancelled run still returns a report with
/// whatever was collected.
pub async fn execute_run(
    request: RunRequest,
    config: &RunConfig,
    sources: Sources,
    cancel: CancellationToken,
    progress_callback: Option<RunProgressCallback>,
) -> Result<Report> {
    check_sources(request.mode, &sources)?;

    let diagnostics = Diagnostics::new();
    let targets = normalize_targets(&request.targets, &diagnostics)?;
    if request.mode == Mode::Compare && targets.len() < 2 {
        return Err(LinkscoutError::InsufficientDomains(targets.len()));
    }
    if let Some(referrer) = &request.referrer {
        normalize_domain(referrer)?;
    }

    let context = RunContext {
        config,
        gate: Arc::new(RequestGate::new(config.min_request_interval())),
        diagnostics: diagnostics.clone(),
        blacklist: Arc::new(config.blacklist.clone()),
        cancel: cancel.clone(),
        progress: progress_callback,
    };

    info!(
        "Starting {} run for {} target(s)",
        request.mode.as_str(),
        targets.len()
    );

    let findings = match request.mode {
        Mode::CombinationSearch => context.combination_search(&targets, &sources).await,
        mode => {
            let provider = sources.provider.clone().ok_or_else(|| {
                LinkscoutError::Config(format!("{} needs a link provider", mode.as_str()))
            })?;
            let client = context.link_client(provider);
            match mode {
                Mode::TwiceRemoved => context.twice_removed(&targets, client).await,
                Mode::Compare => context.compare(&targets, client).await?,
                Mode::Anchors => context.anchors(&targets, &request, client).await?,
                _ => context.shared_domains(mode, &targets, client).await,
            }
        }
    };

    if cancel.is_cancelled() {
        warn!("Run cancelled, returning partial results");
        diagnostics.mark_cancelled();
    }

    let report = Report::new(request.mode, targets, findings, diagnostics.snapshot());
    info!(
        "{} run finished with {} findings",
        request.mode.as_str(),
        report.findings.len()
    );
    Ok(report)
}

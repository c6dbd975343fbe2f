// Report model and rendering

use crate::authority::authority_bar;
use crate::diagnostics::RunDiagnostics;
use crate::model::{
    AnchorContext, AnnotatedDomain, ComparisonResult, DomainProfile, Entity, ScoredUrl,
    SharedDomain, TwiceRemovedPath, TwiceRemovedSummary,
};
use crate::run::Mode;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Combination-search outcome for one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySearchResult {
    pub domain: String,
    pub entities: Vec<Entity>,
    pub queries: usize,
    pub results: Vec<ScoredUrl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedDomainsResult {
    pub target: DomainProfile,
    pub domains: Vec<SharedDomain>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwiceRemovedResult {
    pub target: DomainProfile,
    pub paths: Vec<TwiceRemovedPath>,
    pub summary: Vec<TwiceRemovedSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorResult {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    pub anchors: Vec<AnchorContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "results", rename_all = "kebab-case")]
pub enum Findings {
    CombinationSearch(Vec<EntitySearchResult>),
    SimilarProfile(Vec<SharedDomainsResult>),
    CoLinked(Vec<SharedDomainsResult>),
    TwiceRemoved(Vec<TwiceRemovedResult>),
    Compare(Box<ComparisonResult>),
    Anchors(Vec<AnchorResult>),
}

impl Findings {
    /// Number of reported items (URLs, domains, paths or anchors).
    pub fn len(&self) -> usize {
        match self {
            Findings::CombinationSearch(r) => r.iter().map(|d| d.results.len()).sum(),
            Findings::SimilarProfile(r) | Findings::CoLinked(r) => {
                r.iter().map(|t| t.domains.len()).sum()
            }
            Findings::TwiceRemoved(r) => r.iter().map(|t| t.paths.len()).sum(),
            Findings::Compare(c) => c.common_backlinks.len() + c.common_outlinks.len(),
            Findings::Anchors(r) => r.iter().map(|t| t.anchors.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub mode: Mode,
    pub targets: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub findings: Findings,
    pub diagnostics: RunDiagnostics,
}

impl Report {
    pub fn new(mode: Mode, targets: Vec<String>, findings: Findings, diagnostics: RunDiagnostics) -> Self {
        Self {
            mode,
            targets,
            generated_at: Utc::now(),
            findings,
            diagnostics,
        }
    }

    /// An empty result is a valid outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("{}\n", title.bold()));
    report.push_str(RULE);
    report.push_str("\n\n");
}

fn authority_cell(outlink_count: Option<u64>, authority: Option<u8>) -> String {
    match (outlink_count, authority) {
        (Some(count), Some(score)) => format!("{} {:>2}/10  {} outlinks", authority_bar(score), score, count),
        _ => "authority unknown".dimmed().to_string(),
    }
}

fn write_profile(report: &mut String, profile: &DomainProfile) {
    report.push_str(&format!("## {}\n", profile.domain.bright_white().bold()));
    report.push_str(&format!(
        "  Referrers: {}   Outlinks: {}   {}\n\n",
        profile.referrers.len(),
        profile.outlinks.len(),
        authority_cell(profile.outlink_count, profile.authority)
    ));
}

fn write_shared(report: &mut String, results: &[SharedDomainsResult], label: &str) {
    for result in results {
        write_profile(report, &result.target);
        if result.domains.is_empty() {
            report.push_str(&format!("  No {} found\n\n", label));
            continue;
        }
        for shared in &result.domains {
            report.push_str(&format!(
                "  {:>4}  {}\n",
                shared.count.to_string().green(),
                shared.domain
            ));
            report.push_str(&format!("        via {}\n", shared.via.join(", ").dimmed()));
        }
        report.push('\n');
    }
}

fn write_search(report: &mut String, results: &[EntitySearchResult]) {
    for result in results {
        report.push_str(&format!("## {}\n", result.domain.bright_white().bold()));
        let names: Vec<&str> = result.entities.iter().map(|e| e.name.as_str()).collect();
        report.push_str(&format!("  Entities ({}): {}\n", names.len(), names.join(", ")));
        report.push_str(&format!("  Queries:  {}\n\n", result.queries));

        if result.results.is_empty() {
            report.push_str("  No co-occurrence evidence found\n\n");
            continue;
        }
        for (idx, scored) in result.results.iter().enumerate() {
            report.push_str(&format!(
                "  [{}] {} {}\n",
                idx + 1,
                format!("score {}", scored.score).green(),
                scored.url
            ));
            report.push_str(&format!("      engines: {}\n", scored.engines.join(", ")));
            for combination in &scored.combinations {
                report.push_str(&format!(
                    "      {} {}\n",
                    format!("w{}", combination.weight()).cyan(),
                    combination.members().join(" + ")
                ));
            }
            if let Some(snippet) = &scored.snippet {
                report.push_str(&format!("      {}\n", snippet.dimmed()));
            }
        }
        report.push('\n');
    }
}

fn write_twice_removed(report: &mut String, results: &[TwiceRemovedResult]) {
    for result in results {
        write_profile(report, &result.target);
        if result.summary.is_empty() {
            report.push_str("  No twice-removed referrers found\n\n");
            continue;
        }
        for summary in &result.summary {
            report.push_str(&format!(
                "  {:>4}  {}\n",
                summary.paths.to_string().green(),
                summary.domain
            ));
            report.push_str(&format!(
                "        {} -> {{{}}} -> {}\n",
                summary.domain.dimmed(),
                summary.via.join(", ").dimmed(),
                result.target.domain.dimmed()
            ));
        }
        report.push('\n');
    }
}

fn write_annotated(report: &mut String, title: &str, domains: &[AnnotatedDomain]) {
    report.push_str(&format!("{} ({})\n", title.bold(), domains.len()));
    if domains.is_empty() {
        report.push_str("  none\n");
    }
    for domain in domains {
        report.push_str(&format!(
            "  {:<40} {}\n",
            domain.domain,
            authority_cell(domain.outlink_count, domain.authority)
        ));
    }
    report.push('\n');
}

fn write_anchors(report: &mut String, results: &[AnchorResult]) {
    for result in results {
        report.push_str(&format!("## {}\n", result.target.bright_white().bold()));
        if let Some(referrer) = &result.referrer {
            report.push_str(&format!("  Referrer: {}\n", referrer));
        }
        if let Some(term) = &result.term {
            report.push_str(&format!("  Filter:   {}\n", term));
        }
        report.push('\n');
        if result.anchors.is_empty() {
            report.push_str("  No matching anchors\n\n");
            continue;
        }
        for anchor in &result.anchors {
            let mut flags = Vec::new();
            if anchor.nofollow {
                flags.push("nofollow".yellow().to_string());
            }
            if let Some(first_seen) = anchor.first_seen {
                flags.push(format!("first seen {}", first_seen));
            }
            report.push_str(&format!("  {} {}\n", anchor.referrer.cyan(), flags.join("  ")));
            report.push_str(&format!(
                "    ...{} [{}] {}...\n",
                anchor.context_before,
                anchor.anchor_text.bold(),
                anchor.context_after
            ));
            report.push_str(&format!("  {}\n", THIN_RULE.dimmed()));
        }
        report.push('\n');
    }
}

fn write_diagnostics(report: &mut String, diagnostics: &RunDiagnostics) {
    section(report, "SOURCES");
    if diagnostics.is_clean() {
        report.push_str(&format!("  {}\n\n", "All sources answered".green()));
        return;
    }
    if diagnostics.cancelled {
        report.push_str(&format!("  {}\n", "Run cancelled: results are partial".yellow().bold()));
    }
    if !diagnostics.unavailable_sources.is_empty() {
        let sources: Vec<&str> = diagnostics
            .unavailable_sources
            .iter()
            .map(String::as_str)
            .collect();
        report.push_str(&format!("  {} {}\n", "Unavailable:".red(), sources.join(", ")));
    }
    for failure in &diagnostics.failures {
        report.push_str(&format!("    [{}] {}: {}\n", failure.source, failure.unit, failure.error));
    }
    if !diagnostics.limits_reached.is_empty() {
        report.push_str(&format!(
            "  {} {}\n",
            "Capped by provider:".yellow(),
            diagnostics
                .limits_reached
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    report.push('\n');
}

pub fn generate_text_report(data: &Report) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                      LINKSCOUT RELATIONSHIP REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");
    report.push_str(&format!("Mode:         {}\n", data.mode.as_str()));
    report.push_str(&format!("Targets:      {}\n", data.targets.join(", ")));
    report.push_str(&format!("Generated:    {}\n", data.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    report.push_str(&format!("Findings:     {}\n\n", data.findings.len()));

    match &data.findings {
        Findings::CombinationSearch(results) => {
            section(&mut report, "ENTITY CO-OCCURRENCE");
            write_search(&mut report, results);
        }
        Findings::SimilarProfile(results) => {
            section(&mut report, "SIMILAR LINK PROFILES");
            write_shared(&mut report, results, "similar domains");
        }
        Findings::CoLinked(results) => {
            section(&mut report, "CO-LINKED DOMAINS");
            write_shared(&mut report, results, "co-linked domains");
        }
        Findings::TwiceRemoved(results) => {
            section(&mut report, "TWICE-REMOVED BACKLINKS");
            write_twice_removed(&mut report, results);
        }
        Findings::Compare(comparison) => {
            section(&mut report, "DOMAIN COMPARISON");
            report.push_str(&format!("Compared: {}\n\n", comparison.domains.join(", ")));
            write_annotated(&mut report, "Common backlinks", &comparison.common_backlinks);
            write_annotated(&mut report, "Common outlinks", &comparison.common_outlinks);
        }
        Findings::Anchors(results) => {
            section(&mut report, "ANCHOR CONTEXT");
            write_anchors(&mut report, results);
        }
    }

    write_diagnostics(&mut report, &data.diagnostics);

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                            End of Report\n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str("\nLink data is provider-sampled; counts are lower bounds.\n");
    report.push_str("Entity co-occurrence is a ranked heuristic, not proof of a relationship.\n\n");

    report
}

pub fn generate_json_report(data: &Report) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "linkscout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at.to_rfc3339(),
                "format": "json"
            },
            "mode": data.mode,
            "targets": data.targets,
            "summary": {
                "total_findings": data.findings.len(),
                "unavailable_sources": data.diagnostics.unavailable_sources,
                "cancelled": data.diagnostics.cancelled
            },
            "findings": data.findings,
            "diagnostics": data.diagnostics
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

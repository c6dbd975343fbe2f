use chrono::NaiveDate;
use linkscout_scanner::EntityKind;
use serde::{Deserialize, Serialize};

/// A person or organization found in a domain's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Display form (whitespace-collapsed, original casing).
    pub name: String,
    /// Case-folded, whitespace-collapsed dedup key.
    pub key: String,
    pub kind: EntityKind,
    pub confidence: f32,
    pub source_domain: String,
}

/// Case-fold and collapse whitespace; two mentions with the same key are the
/// same entity.
pub fn entity_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// An unordered set of entity names used as one conjunctive query.
///
/// Members are kept sorted so equal sets compare equal; the weight is always
/// the number of members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Combination {
    members: Vec<String>,
}

impl Combination {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members: Vec<String> = members.into_iter().map(Into::into).collect();
        members.sort_by_key(|m| entity_key(m));
        members.dedup_by_key(|m| entity_key(m));
        Self { members }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn weight(&self) -> u32 {
        self.members.len() as u32
    }

    /// `site:<domain> "A" "B" ...`
    pub fn query(&self, domain: &str) -> String {
        let phrases: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("\"{}\"", m.replace('"', "")))
            .collect();
        format!("site:{} {}", domain, phrases.join(" "))
    }
}

/// One URL after aggregation across engines and combinations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredUrl {
    pub url: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub score: u32,
    pub combinations: Vec<Combination>,
    pub engines: Vec<String>,
}

/// A (referrer, target) link with its provider metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacklinkEdge {
    pub referrer: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    #[serde(skip_serializing)]
    pub html: Option<String>,
    pub nofollow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<NaiveDate>,
}

/// Anchor text plus bounded surrounding context for one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorContext {
    pub referrer: String,
    pub target: String,
    pub anchor_text: String,
    pub context_before: String,
    pub context_after: String,
    pub nofollow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<NaiveDate>,
}

/// A candidate domain and the seed domains that link to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedDomain {
    pub domain: String,
    pub count: usize,
    pub via: Vec<String>,
}

/// `domain` links to `via`, which links to `target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TwiceRemovedPath {
    pub domain: String,
    pub via: String,
    pub target: String,
}

/// Second-level referrer with every first-level domain it reaches the target through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwiceRemovedSummary {
    pub domain: String,
    pub paths: usize,
    pub via: Vec<String>,
}

/// A domain annotated for authority scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedDomain {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlink_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub domains: Vec<String>,
    pub common_backlinks: Vec<AnnotatedDomain>,
    pub common_outlinks: Vec<AnnotatedDomain>,
}

/// Everything known about one domain within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainProfile {
    pub domain: String,
    pub referrers: Vec<String>,
    pub outlinks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlink_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<u8>,
    pub blacklisted: bool,
}

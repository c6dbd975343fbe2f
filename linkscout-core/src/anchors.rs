use crate::cache::BacklinkGraphClient;
use crate::domain::{Blacklist, normalize_domain};
use crate::error::Result;
use crate::model::{AnchorContext, BacklinkEdge};
use linkscout_scanner::html::anchors_to;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_CONTEXT_WINDOW: usize = 100;

/// Last `n` characters of `text`.
pub fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - n)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &text[start..]
}

/// First `n` characters of `text`.
pub fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Case-insensitive match over anchor text and both context sides.
pub fn matches_term(context: &AnchorContext, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        &context.anchor_text,
        &context.context_before,
        &context.context_after,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Anchor contexts for one edge, windowed to `window` characters each side.
///
/// An HTML fragment, when present and linking to the target, takes precedence
/// over the provider's pre-extracted fields.
pub fn contexts_for_edge(edge: &BacklinkEdge, window: usize) -> Vec<AnchorContext> {
    let from_html: Vec<AnchorContext> = edge
        .html
        .as_deref()
        .map(|html| anchors_to(html, &edge.target))
        .unwrap_or_default()
        .into_iter()
        .map(|anchor| AnchorContext {
            referrer: edge.referrer.clone(),
            target: edge.target.clone(),
            anchor_text: anchor.text,
            context_before: tail_chars(&anchor.before, window).trim_start().to_string(),
            context_after: head_chars(&anchor.after, window).trim_end().to_string(),
            nofollow: anchor.nofollow || edge.nofollow,
            first_seen: edge.first_seen,
        })
        .collect();
    if !from_html.is_empty() {
        return from_html;
    }

    vec![AnchorContext {
        referrer: edge.referrer.clone(),
        target: edge.target.clone(),
        anchor_text: edge.anchor.clone().unwrap_or_default(),
        context_before: tail_chars(edge.context_before.as_deref().unwrap_or_default(), window)
            .to_string(),
        context_after: head_chars(edge.context_after.as_deref().unwrap_or_default(), window)
            .to_string(),
        nofollow: edge.nofollow,
        first_seen: edge.first_seen,
    }]
}

/// Anchor text and surrounding context of the links pointing at a domain.
pub struct AnchorContextExtractor {
    client: Arc<BacklinkGraphClient>,
    blacklist: Arc<Blacklist>,
    window: usize,
}

impl AnchorContextExtractor {
    pub fn new(client: Arc<BacklinkGraphClient>, blacklist: Arc<Blacklist>) -> Self {
        Self {
            client,
            blacklist,
            window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Contexts for every inbound edge of `target`, optionally restricted to
    /// one referrer and filtered by `term`.
    pub async fn extract(
        &self,
        target: &str,
        referrer: Option<&str>,
        term: Option<&str>,
    ) -> Result<Vec<AnchorContext>> {
        let target = normalize_domain(target)?;
        let referrer = referrer.map(normalize_domain).transpose()?;
        let edges = self.client.get_referrer_edges(&target).await?;

        let mut contexts: Vec<AnchorContext> = edges
            .iter()
            .filter(|edge| !self.blacklist.contains(&edge.referrer))
            .filter(|edge| referrer.as_ref().is_none_or(|r| edge.referrer == *r))
            .flat_map(|edge| contexts_for_edge(edge, self.window))
            .filter(|context| term.is_none_or(|t| matches_term(context, t)))
            .collect();
        contexts.sort_by(|a, b| {
            a.referrer
                .cmp(&b.referrer)
                .then_with(|| a.anchor_text.cmp(&b.anchor_text))
        });

        info!(
            "{} anchor contexts for {} from {} edges",
            contexts.len(),
            target,
            edges.len()
        );
        Ok(contexts)
    }
}

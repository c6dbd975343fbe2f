use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// An `<a>` element pointing at a given domain, with the text around it.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlAnchor {
    pub href: String,
    pub text: String,
    pub before: String,
    pub after: String,
    pub nofollow: bool,
}

fn is_hidden_element(node: &Node) -> bool {
    node.as_element()
        .map(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        .unwrap_or(false)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an HTML document, whitespace-collapsed.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut pieces = Vec::new();
    for node in root.descendants() {
        if let Some(text) = node.value().as_text()
            && !node.ancestors().any(|a| is_hidden_element(a.value()))
        {
            pieces.push(&**text);
        }
    }
    collapse_whitespace(&pieces.join(" "))
}

/// Whether `href` is an absolute link to `domain` or one of its subdomains.
pub fn href_points_to(href: &str, domain: &str) -> bool {
    let Ok(parsed) = Url::parse(href) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn is_nofollow(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .attr("rel")
        .map(|rel| {
            rel.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("nofollow"))
        })
        .unwrap_or(false)
}

/// Find every anchor in an HTML fragment that links to `domain`.
///
/// `before`/`after` hold all visible text of the fragment on either side of the
/// anchor; callers trim them to their own window.
pub fn anchors_to(html: &str, domain: &str) -> Vec<HtmlAnchor> {
    let fragment = Html::parse_fragment(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let matching: Vec<ElementRef<'_>> = fragment
        .select(&link_selector)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href_points_to(href, domain))
        })
        .collect();
    if matching.is_empty() {
        return Vec::new();
    }

    // Flatten visible text, remembering the byte span each anchor covers.
    let mut flat = String::new();
    let mut spans: Vec<Option<(usize, usize)>> = vec![None; matching.len()];
    for node in fragment.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if node.ancestors().any(|a| is_hidden_element(a.value())) {
            continue;
        }
        flat.push(' ');
        let start = flat.len();
        flat.push_str(text);
        let end = flat.len();

        for (idx, anchor) in matching.iter().enumerate() {
            if node.ancestors().any(|ancestor| ancestor.id() == anchor.id()) {
                spans[idx] = Some(match spans[idx] {
                    Some((s, e)) => (s.min(start), e.max(end)),
                    None => (start, end),
                });
            }
        }
    }

    matching
        .iter()
        .zip(spans)
        .map(|(anchor, span)| {
            let (text, before, after) = match span {
                Some((start, end)) => (
                    collapse_whitespace(&flat[start..end]),
                    collapse_whitespace(&flat[..start]),
                    collapse_whitespace(&flat[end..]),
                ),
                None => (String::new(), String::new(), String::new()),
            };
            HtmlAnchor {
                href: anchor.value().attr("href").unwrap_or_default().to_string(),
                text,
                before,
                after,
                nofollow: is_nofollow(anchor),
            }
        })
        .collect()
}

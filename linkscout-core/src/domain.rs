use crate::error::{LinkscoutError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::{Host, Url};

/// Normalize a user- or provider-supplied domain.
///
/// Accepts bare hosts or URLs, lower-cases, drops scheme/port/path, a leading
/// `www.` and a trailing dot. IP addresses and single-label hosts are rejected.
pub fn normalize_domain(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LinkscoutError::InvalidDomain(input.to_string()));
    }

    let host = if trimmed.contains("://") {
        Url::parse(trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| LinkscoutError::InvalidDomain(input.to_string()))?
    } else {
        let end = trimmed.find(['/', '?', '#']).unwrap_or(trimmed.len());
        let host_port = &trimmed[..end];
        match host_port.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
            _ => host_port.to_string(),
        }
    };

    let host = host.to_lowercase();
    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    match Host::parse(host) {
        Ok(Host::Domain(parsed)) if parsed.contains('.') && !parsed.starts_with('.') => Ok(parsed),
        _ => Err(LinkscoutError::InvalidDomain(input.to_string())),
    }
}

/// Host of a URL, normalized like [`normalize_domain`].
pub fn domain_of_url(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().and_then(|h| normalize_domain(h).ok()))
}

/// Low-value or spam aggregator domains excluded from every graph result.
///
/// Matching covers subdomains: blacklisting `facebook.com` also removes
/// `m.facebook.com`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Blacklist {
    domains: BTreeSet<String>,
}

impl Blacklist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .filter_map(|d| normalize_domain(d.as_ref()).ok())
                .collect(),
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        if self.domains.contains(domain) {
            return true;
        }
        domain
            .match_indices('.')
            .any(|(idx, _)| self.domains.contains(&domain[idx + 1..]))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.domains.iter()
    }
}

impl From<Vec<String>> for Blacklist {
    fn from(domains: Vec<String>) -> Self {
        Self::new(domains)
    }
}

impl From<Blacklist> for Vec<String> {
    fn from(blacklist: Blacklist) -> Self {
        blacklist.domains.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_domain() {
        assert_eq!(normalize_domain("Example.COM").unwrap(), "example.com");
        assert_eq!(normalize_domain("  example.com.  ").unwrap(), "example.com");
    }

    #[test]
    fn test_normalize_strips_www_scheme_port_and_path() {
        assert_eq!(
            normalize_domain("https://www.example.com:8443/about?x=1").unwrap(),
            "example.com"
        );
        assert_eq!(normalize_domain("www.example.com/path").unwrap(), "example.com");
        assert_eq!(normalize_domain("example.com:80").unwrap(), "example.com");
    }

    #[test]
    fn test_normalize_keeps_subdomains() {
        assert_eq!(normalize_domain("blog.example.co.uk").unwrap(), "blog.example.co.uk");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("localhost").is_err());
        assert!(normalize_domain("not a domain").is_err());
        assert!(normalize_domain("127.0.0.1").is_err());
        assert!(matches!(
            normalize_domain("bad domain"),
            Err(LinkscoutError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_domain_of_url() {
        assert_eq!(
            domain_of_url("https://www.Example.com/team#x"),
            Some("example.com".to_string())
        );
        assert_eq!(domain_of_url("nonsense"), None);
    }

    #[test]
    fn test_blacklist_matches_subdomains() {
        let blacklist = Blacklist::new(["facebook.com", "https://www.twitter.com/"]);
        assert!(blacklist.contains("facebook.com"));
        assert!(blacklist.contains("m.facebook.com"));
        assert!(blacklist.contains("twitter.com"));
        assert!(!blacklist.contains("notfacebook.com"));
        assert_eq!(blacklist.len(), 2);
    }

    #[test]
    fn test_blacklist_serializes_as_list() {
        let blacklist: Blacklist = serde_json::from_str(r#"["WWW.Pinterest.com", "bad entry"]"#).unwrap();
        assert!(blacklist.contains("pinterest.com"));
        assert_eq!(blacklist.len(), 1);
        assert_eq!(serde_json::to_string(&blacklist).unwrap(), r#"["pinterest.com"]"#);
    }
}

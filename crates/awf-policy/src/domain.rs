//! Allow-list entries in their normalized, matchable form

use crate::error::{PolicyError, Result};
use awf_types::HOST_GATEWAY;
use serde::{Deserialize, Serialize};

/// How a pattern matches candidate hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    /// Bare domain: matches the domain itself and any subdomain.
    Exact,
    /// `*.domain`: matches subdomains only, never the bare domain.
    WildcardLeading,
    /// The localhost keyword, rewritten to the host gateway name.
    Localhost,
}

/// Scheme prefix the user attached to the entry, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolHint {
    None,
    Http,
    Https,
}

/// One normalized allow-list entry.
///
/// `canonical` is the lowercased, whitespace-trimmed form with a single
/// trailing dot removed; for wildcards it is the suffix after `*.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainPattern {
    original: String,
    canonical: String,
    kind: PatternKind,
    protocol_hint: ProtocolHint,
}

/// Canonicalize a host for matching: trim, lowercase, drop one trailing dot.
pub fn canonicalize_host(host: &str) -> String {
    let trimmed = host.trim().to_lowercase();
    match trimmed.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => trimmed,
    }
}

impl DomainPattern {
    /// Parse one raw allow-list entry.
    ///
    /// Returns `Ok(None)` for entries that are empty after trimming, which
    /// the policy builder silently drops.
    pub fn parse(raw: &str) -> Result<Option<DomainPattern>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let (hint, rest) = if let Some(r) = strip_scheme(trimmed, "https://") {
            (ProtocolHint::Https, r)
        } else if let Some(r) = strip_scheme(trimmed, "http://") {
            (ProtocolHint::Http, r)
        } else {
            (ProtocolHint::None, trimmed)
        };

        let canonical = canonicalize_host(rest);
        if canonical.is_empty() {
            return Ok(None);
        }

        if canonical == "localhost" {
            return Ok(Some(DomainPattern {
                original: raw.to_string(),
                canonical: HOST_GATEWAY.to_string(),
                kind: PatternKind::Localhost,
                protocol_hint: hint,
            }));
        }

        if let Some(suffix) = canonical.strip_prefix("*.") {
            if suffix.is_empty() || suffix.contains('*') {
                return Err(PolicyError::InvalidWildcard(raw.to_string()));
            }
            return Ok(Some(DomainPattern {
                original: raw.to_string(),
                canonical: suffix.to_string(),
                kind: PatternKind::WildcardLeading,
                protocol_hint: hint,
            }));
        }

        if canonical.contains('*') {
            return Err(PolicyError::InvalidWildcard(raw.to_string()));
        }

        if !is_plausible_host(&canonical) {
            return Err(PolicyError::InvalidDomain(raw.to_string()));
        }

        Ok(Some(DomainPattern {
            original: raw.to_string(),
            canonical,
            kind: PatternKind::Exact,
            protocol_hint: hint,
        }))
    }

    /// The user's original spelling.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The canonical matchable form (the `*.`-less suffix for wildcards).
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn protocol_hint(&self) -> ProtocolHint {
        self.protocol_hint
    }

    /// Whether this pattern admits `host`.
    ///
    /// Matching is case-insensitive and trailing-dot-insensitive because both
    /// sides go through [`canonicalize_host`].
    pub fn matches(&self, host: &str) -> bool {
        let host = canonicalize_host(host);
        if host.is_empty() {
            return false;
        }
        match self.kind {
            PatternKind::Exact | PatternKind::Localhost => {
                host == self.canonical || host.ends_with(&format!(".{}", self.canonical))
            }
            PatternKind::WildcardLeading => host.ends_with(&format!(".{}", self.canonical)),
        }
    }

    /// Squid `dstdomain` ACL entry, when the pattern is expressible as one.
    ///
    /// Squid's leading-dot form covers the domain and all subdomains, which
    /// matches the exact-pattern contract. Subdomain-only wildcards need a
    /// regex ACL instead, see [`DomainPattern::acl_regex`].
    pub fn acl_dstdomain(&self) -> Option<String> {
        match self.kind {
            PatternKind::Exact | PatternKind::Localhost => {
                Some(format!(".{}", self.canonical))
            }
            PatternKind::WildcardLeading => None,
        }
    }

    /// Squid `dstdom_regex` entry for subdomain-only wildcard patterns.
    pub fn acl_regex(&self) -> Option<String> {
        match self.kind {
            PatternKind::WildcardLeading => {
                Some(format!(r"\.{}$", regex_escape(&self.canonical)))
            }
            _ => None,
        }
    }

    /// Deduplication key: two entries that normalize to the same canonical
    /// form and kind are the same pattern.
    pub(crate) fn dedup_key(&self) -> (PatternKind, String) {
        (self.kind, self.canonical.clone())
    }
}

fn strip_scheme<'a>(s: &'a str, scheme: &str) -> Option<&'a str> {
    if s.len() >= scheme.len() && s[..scheme.len()].eq_ignore_ascii_case(scheme) {
        Some(&s[scheme.len()..])
    } else {
        None
    }
}

/// Loose host shape check: labels of alphanumerics, hyphens, underscores.
/// IP literals are accepted as exact entries.
fn is_plausible_host(host: &str) -> bool {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    if host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// Escape a literal domain for use inside a squid regex ACL.
fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '.' || c == '-' {
            if c == '.' {
                out.push('\\');
            }
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(raw: &str) -> DomainPattern {
        DomainPattern::parse(raw).unwrap().unwrap()
    }

    #[test]
    fn test_exact_matches_self_and_subdomains() {
        let p = pat("github.com");
        assert!(p.matches("github.com"));
        assert!(p.matches("api.github.com"));
        assert!(!p.matches("github.com.evil.com"));
        assert!(!p.matches("notgithub.com"));
    }

    #[test]
    fn test_wildcard_matches_subdomains_only() {
        let p = pat("*.github.com");
        assert_eq!(p.kind(), PatternKind::WildcardLeading);
        assert!(p.matches("api.github.com"));
        assert!(p.matches("raw.github.com"));
        assert!(!p.matches("github.com"));
        assert!(!p.matches("notgithub.com"));
    }

    #[test]
    fn test_case_and_trailing_dot_insensitive() {
        let p = pat("GitHub.COM.");
        assert_eq!(p.canonical(), "github.com");
        assert!(p.matches("API.GITHUB.COM"));
        assert!(p.matches("github.com."));
    }

    #[test]
    fn test_scheme_prefix_sets_hint() {
        let p = pat("https://example.com");
        assert_eq!(p.protocol_hint(), ProtocolHint::Https);
        assert_eq!(p.canonical(), "example.com");
        let p = pat("http://example.com");
        assert_eq!(p.protocol_hint(), ProtocolHint::Http);
    }

    #[test]
    fn test_localhost_keyword_rewrites_to_host_gateway() {
        let p = pat("localhost");
        assert_eq!(p.kind(), PatternKind::Localhost);
        assert_eq!(p.canonical(), HOST_GATEWAY);
        let p = pat("HTTP://LocalHost");
        assert_eq!(p.kind(), PatternKind::Localhost);
    }

    #[test]
    fn test_empty_entries_are_dropped() {
        assert!(DomainPattern::parse("").unwrap().is_none());
        assert!(DomainPattern::parse("   ").unwrap().is_none());
        assert!(DomainPattern::parse(".").unwrap().is_none());
    }

    #[test]
    fn test_misplaced_wildcards_rejected() {
        assert!(DomainPattern::parse("api.*.github.com").is_err());
        assert!(DomainPattern::parse("github.*").is_err());
        assert!(DomainPattern::parse("*.").is_err());
        assert!(DomainPattern::parse("*.*.com").is_err());
    }

    #[test]
    fn test_acl_rendering() {
        assert_eq!(pat("github.com").acl_dstdomain().unwrap(), ".github.com");
        assert!(pat("github.com").acl_regex().is_none());
        assert_eq!(
            pat("*.github.com").acl_regex().unwrap(),
            r"\.github\.com$"
        );
        assert!(pat("*.github.com").acl_dstdomain().is_none());
    }
}

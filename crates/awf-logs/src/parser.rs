//! Access-log line parsing
//!
//! The proxy writes one space-separated positional line per request:
//!
//! ```text
//! <ts.ms> <clientIp>:<port> <host> <destIp>:<destPort> <proto> <method> <status> <decision> <url> "<userAgent>"
//! ```
//!
//! Parsing is a single pass over explicit field boundaries; any deviation is
//! a no-match, never an error. The caller decides whether to log the line or
//! forward it raw.

use serde::{Deserialize, Serialize};

/// One parsed access-log line with its derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogRecord {
    /// Fractional seconds since the epoch.
    pub timestamp: f64,
    pub client_addr: String,
    pub host: String,
    pub dest_addr: String,
    pub protocol_version: String,
    pub method: String,
    pub status_code: u16,
    pub decision: String,
    pub url: String,
    pub user_agent: String,
    /// Hostname the request was for, derived from url/host.
    pub domain: String,
    /// Destination port derived alongside `domain`, when present.
    pub port: Option<u16>,
    /// True iff the decision begins with `TCP_TUNNEL` or `TCP_MISS`.
    pub is_allowed: bool,
    /// True iff the method is CONNECT.
    pub is_https: bool,
    /// Optional process enrichment, absent unless a collector filled it in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,
}

/// Parse one access-log line. Blank input and malformed lines are no-match.
pub fn parse_line(line: &str) -> Option<AccessLogRecord> {
    let mut rest = line.trim();
    if rest.is_empty() {
        return None;
    }

    let timestamp = next_field(&mut rest)?.parse::<f64>().ok()?;
    let client_addr = next_field(&mut rest)?;
    if !client_addr.contains(':') {
        return None;
    }
    let host = next_field(&mut rest)?;
    let dest_addr = next_field(&mut rest)?;
    if !dest_addr.contains(':') {
        return None;
    }
    let protocol_version = next_field(&mut rest)?;
    let method = next_field(&mut rest)?;
    let status_code = next_field(&mut rest)?.parse::<u16>().ok()?;
    let decision = next_field(&mut rest)?;
    let url = next_field(&mut rest)?;

    // The user agent is the quoted remainder of the line.
    let quoted = rest.trim();
    let user_agent = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))?;

    let is_allowed = decision.starts_with("TCP_TUNNEL") || decision.starts_with("TCP_MISS");
    let is_https = method == "CONNECT";
    let (domain, port) = derive_domain(method, host, url);

    Some(AccessLogRecord {
        timestamp,
        client_addr: client_addr.to_string(),
        host: host.to_string(),
        dest_addr: dest_addr.to_string(),
        protocol_version: protocol_version.to_string(),
        method: method.to_string(),
        status_code,
        decision: decision.to_string(),
        url: url.to_string(),
        user_agent: user_agent.to_string(),
        domain,
        port,
        is_allowed,
        is_https,
        pid: None,
        comm: None,
        cmdline: None,
        inode: None,
    })
}

/// Advance past one whitespace-delimited field.
fn next_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        *rest = trimmed;
        return None;
    }
    match trimmed.find(char::is_whitespace) {
        Some(idx) => {
            let (field, tail) = trimmed.split_at(idx);
            *rest = tail;
            Some(field)
        }
        None => {
            *rest = "";
            Some(trimmed)
        }
    }
}

/// Split a trailing `:<digits>` port off a hostname.
fn split_host_port(target: &str) -> (&str, Option<u16>) {
    if let Some((host, port)) = target.rsplit_once(':') {
        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(port) = port.parse::<u16>() {
                return (host, Some(port));
            }
        }
    }
    (target, None)
}

/// Derive the request's domain (and port, when present).
///
/// CONNECT targets are `host:port`; plain requests prefer the Host header
/// field; anything else goes through lightweight URL surgery, falling back to
/// the raw url string when no hostname can be found.
fn derive_domain(method: &str, host: &str, url: &str) -> (String, Option<u16>) {
    if method == "CONNECT" {
        let (domain, port) = split_host_port(url);
        if !domain.is_empty() {
            return (domain.to_string(), port);
        }
    }

    if !host.is_empty() && host != "-" {
        let (domain, port) = split_host_port(host);
        if !domain.is_empty() {
            return (domain.to_string(), port);
        }
    }

    if let Some((domain, port)) = host_from_url(url) {
        return (domain, port);
    }

    (url.to_string(), None)
}

/// Pull the authority's hostname out of a URL, tolerating a missing scheme.
fn host_from_url(url: &str) -> Option<(String, Option<u16>)> {
    let after_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let authority = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme);
    let host = match authority.rsplit_once('@') {
        Some((_, host)) => host,
        None => authority,
    };
    let (host, port) = split_host_port(host);
    if host.is_empty() || host == "-" {
        return None;
    }
    Some((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUNNEL_LINE: &str = r#"1761074374.646 172.30.0.20:39748 api.github.com:443 140.82.114.22:443 1.1 CONNECT 200 TCP_TUNNEL:HIER_DIRECT api.github.com:443 "-""#;
    const DENIED_LINE: &str = r#"1760994429.358 172.30.0.20:36274 github.com:8443 -:- 1.1 CONNECT 403 TCP_DENIED:HIER_NONE github.com:8443 "curl/7.81.0""#;

    #[test]
    fn test_parse_tunnel_line() {
        let record = parse_line(TUNNEL_LINE).unwrap();
        assert_eq!(record.domain, "api.github.com");
        assert!(record.is_allowed);
        assert!(record.is_https);
        assert_eq!(record.status_code, 200);
        assert_eq!(record.port, Some(443));
        assert_eq!(record.user_agent, "-");
        assert!((record.timestamp - 1761074374.646).abs() < 1e-6);
    }

    #[test]
    fn test_parse_denied_line() {
        let record = parse_line(DENIED_LINE).unwrap();
        assert_eq!(record.domain, "github.com");
        assert!(!record.is_allowed);
        assert_eq!(record.status_code, 403);
        assert_eq!(record.port, Some(8443));
        assert_eq!(record.user_agent, "curl/7.81.0");
        assert_eq!(record.dest_addr, "-:-");
    }

    #[test]
    fn test_blank_and_garbage_are_no_match() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   \t ").is_none());
        assert!(parse_line("garbage").is_none());
    }

    #[test]
    fn test_non_numeric_status_is_no_match() {
        let line = TUNNEL_LINE.replace(" 200 ", " OK ");
        assert!(parse_line(&line).is_none());
    }

    #[test]
    fn test_unquoted_user_agent_is_no_match() {
        let line = TUNNEL_LINE.trim_end_matches('"').trim_end();
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn test_missing_fields_are_no_match() {
        let line = r#"1761074374.646 172.30.0.20:39748 api.github.com:443 "-""#;
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn test_http_request_prefers_host_field() {
        let line = r#"1761074374.646 172.30.0.20:39748 example.com:80 93.184.216.34:80 1.1 GET 200 TCP_MISS:HIER_DIRECT http://example.com/index.html "curl/7.81.0""#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.port, Some(80));
        assert!(record.is_allowed);
        assert!(!record.is_https);
    }

    #[test]
    fn test_missing_host_falls_back_to_url_parsing() {
        let line = r#"1761074374.646 172.30.0.20:39748 - 93.184.216.34:80 1.1 GET 404 TCP_MISS:HIER_DIRECT http://user@example.com:8080/path?q=1 "-""#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.port, Some(8080));
    }

    #[test]
    fn test_unparseable_url_returns_original() {
        let line = r#"1761074374.646 172.30.0.20:39748 - -:- 1.1 NONE 400 TCP_DENIED:HIER_NONE error:invalid-request "-""#;
        let record = parse_line(line).unwrap();
        // "error:invalid-request" has no digits-only port and no scheme, so
        // the authority walk yields the string itself.
        assert_eq!(record.domain, "error:invalid-request");
    }

    #[test]
    fn test_derivations_are_reproducible() {
        for line in [TUNNEL_LINE, DENIED_LINE] {
            let record = parse_line(line).unwrap();
            let (domain, port) = derive_domain(&record.method, &record.host, &record.url);
            assert_eq!(domain, record.domain);
            assert_eq!(port, record.port);
            assert_eq!(
                record.is_allowed,
                record.decision.starts_with("TCP_TUNNEL")
                    || record.decision.starts_with("TCP_MISS")
            );
            assert_eq!(record.is_https, record.method == "CONNECT");
        }
    }
}

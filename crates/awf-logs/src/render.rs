//! Rendering parsed records and aggregate statistics

use crate::parser::AccessLogRecord;
use crate::stats::AggregatedStats;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::IsTerminal;

/// Formats individual records (or raw lines when parsing failed).
pub trait RecordFormatter {
    fn format_record(&self, record: &AccessLogRecord) -> String;

    /// Raw passthrough; trailing newlines are normalized away because the
    /// writer adds one per line.
    fn format_raw(&self, line: &str) -> String {
        line.trim_end_matches(['\r', '\n']).to_string()
    }
}

/// Passes lines through untouched.
pub struct RawFormatter;

impl RecordFormatter for RawFormatter {
    fn format_record(&self, record: &AccessLogRecord) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {} \"{}\"",
            record.timestamp,
            record.client_addr,
            record.host,
            record.dest_addr,
            record.protocol_version,
            record.method,
            record.status_code,
            record.decision,
            record.url,
            record.user_agent
        )
    }
}

/// One human-readable line per record.
pub struct PrettyFormatter {
    color: bool,
}

impl PrettyFormatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Color iff stdout is a terminal.
    pub fn auto() -> Self {
        Self {
            color: std::io::stdout().is_terminal(),
        }
    }

    /// Display target with the conventional ports suppressed: `:443` for
    /// CONNECT and `:80` for plain HTTP.
    fn display_target(record: &AccessLogRecord) -> String {
        match record.port {
            Some(443) if record.is_https => record.domain.clone(),
            Some(80) if !record.is_https => record.domain.clone(),
            Some(port) => format!("{}:{}", record.domain, port),
            None => record.domain.clone(),
        }
    }

    fn format_timestamp(ts: f64) -> String {
        let secs = ts.trunc() as i64;
        let millis = (ts.fract() * 1000.0).round() as u32;
        match DateTime::<Utc>::from_timestamp(secs, millis.saturating_mul(1_000_000)) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            None => format!("{:.3}", ts),
        }
    }
}

impl RecordFormatter for PrettyFormatter {
    fn format_record(&self, record: &AccessLogRecord) -> String {
        let verdict = if record.is_allowed { "ALLOW" } else { "DENY" };
        let verdict = if self.color {
            if record.is_allowed {
                verdict.green().bold().to_string()
            } else {
                verdict.red().bold().to_string()
            }
        } else {
            verdict.to_string()
        };

        format!(
            "[{}] {:<5} {:<7} {} {} {}",
            Self::format_timestamp(record.timestamp),
            verdict,
            record.method,
            Self::display_target(record),
            record.status_code,
            record.decision
        )
    }
}

/// Newline-delimited JSON, one object per record. Includes the sentinel
/// domain records the Markdown table filters out.
pub struct JsonFormatter;

impl RecordFormatter for JsonFormatter {
    fn format_record(&self, record: &AccessLogRecord) -> String {
        serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
    }
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Plain-text stats summary.
pub fn render_stats_text(stats: &AggregatedStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total requests:   {}\n", stats.total_requests));
    out.push_str(&format!("Allowed requests: {}\n", stats.allowed_requests));
    out.push_str(&format!("Denied requests:  {}\n", stats.denied_requests));
    out.push_str(&format!("Unique domains:   {}\n", stats.unique_domains));
    if let Some(range) = stats.time_range {
        out.push_str(&format!(
            "Time range:       {} .. {}\n",
            PrettyFormatter::format_timestamp(range.start),
            PrettyFormatter::format_timestamp(range.end)
        ));
    }
    if !stats.by_domain.is_empty() {
        out.push('\n');
        for (domain, counts) in stats.domains_by_total() {
            out.push_str(&format!(
                "  {:<40} {:>5} allowed {:>5} denied\n",
                domain, counts.allowed, counts.denied
            ));
        }
    }
    out
}

/// JSON stats document.
pub fn render_stats_json(stats: &AggregatedStats) -> serde_json::Result<String> {
    serde_json::to_string_pretty(stats)
}

/// A single `<details>`-wrapped Markdown block with a summary line and a
/// per-domain table sorted by total descending. The `-` sentinel domain is
/// excluded from the table.
pub fn render_stats_markdown(stats: &AggregatedStats) -> String {
    let rows = stats.domains_by_total();
    let mut out = String::new();
    out.push_str("<details>\n");
    out.push_str(&format!(
        "<summary>Network access: {} ({} allowed, {} denied) across {}</summary>\n\n",
        plural(stats.total_requests, "request"),
        stats.allowed_requests,
        stats.denied_requests,
        plural(rows.len() as u64, "domain")
    ));
    out.push_str("| Domain | Allowed | Denied | Total |\n");
    out.push_str("| --- | ---: | ---: | ---: |\n");
    for (domain, counts) in rows {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            domain, counts.allowed, counts.denied, counts.total
        ));
    }
    out.push_str("\n</details>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use crate::stats::aggregate;

    fn sample(allowed: bool) -> AccessLogRecord {
        let line = if allowed {
            r#"1761074374.646 172.30.0.20:39748 api.github.com:443 140.82.114.22:443 1.1 CONNECT 200 TCP_TUNNEL:HIER_DIRECT api.github.com:443 "-""#
        } else {
            r#"1760994429.358 172.30.0.20:36274 github.com:8443 -:- 1.1 CONNECT 403 TCP_DENIED:HIER_NONE github.com:8443 "curl/7.81.0""#
        };
        parse_line(line).unwrap()
    }

    #[test]
    fn test_raw_round_trips_well_formed_lines() {
        let line = r#"1761074374.646 172.30.0.20:39748 api.github.com:443 140.82.114.22:443 1.1 CONNECT 200 TCP_TUNNEL:HIER_DIRECT api.github.com:443 "-""#;
        let record = parse_line(line).unwrap();
        assert_eq!(RawFormatter.format_record(&record), line);
    }

    #[test]
    fn test_raw_normalizes_trailing_newline() {
        assert_eq!(RawFormatter.format_raw("garbage\n"), "garbage");
        assert_eq!(RawFormatter.format_raw("garbage"), "garbage");
    }

    #[test]
    fn test_pretty_suppresses_conventional_ports() {
        let allowed = sample(true);
        let formatted = PrettyFormatter::new(false).format_record(&allowed);
        assert!(formatted.contains("api.github.com "));
        assert!(!formatted.contains("api.github.com:443"));

        let denied = sample(false);
        let formatted = PrettyFormatter::new(false).format_record(&denied);
        assert!(formatted.contains("github.com:8443"));
        assert!(formatted.contains("DENY"));
    }

    #[test]
    fn test_json_formatter_emits_one_object_per_record() {
        let record = sample(true);
        let json = JsonFormatter.format_record(&record);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["domain"], "api.github.com");
        assert_eq!(value["is_allowed"], true);
        // Unpopulated enrichment stays out of the document.
        assert!(value.get("pid").is_none());
    }

    #[test]
    fn test_markdown_excludes_sentinel_and_pluralizes() {
        let mut no_domain = sample(false);
        no_domain.domain = String::new();
        let records = vec![sample(true), no_domain];
        let stats = aggregate(&records);

        let markdown = render_stats_markdown(&stats);
        assert!(markdown.starts_with("<details>"));
        assert!(markdown.trim_end().ends_with("</details>"));
        assert!(markdown.contains("2 requests"));
        assert!(markdown.contains("1 domain<"));
        assert!(markdown.contains("| api.github.com | 1 | 0 | 1 |"));
        assert!(!markdown.contains("| - |"));
    }

    #[test]
    fn test_json_stats_include_sentinel() {
        let mut no_domain = sample(false);
        no_domain.domain = String::new();
        let stats = aggregate([&no_domain]);
        let json = render_stats_json(&stats).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["by_domain"].get("-").is_some());
    }
}

//! Folding record streams into aggregate statistics

use crate::parser::AccessLogRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Domain key used when a record carries no usable domain.
pub const DOMAIN_SENTINEL: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DomainCounts {
    pub allowed: u64,
    pub denied: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

/// Aggregate over a finite record stream.
///
/// Invariants: `total_requests = allowed_requests + denied_requests`,
/// `unique_domains = |by_domain|`, and `time_range` is `None` exactly for the
/// empty stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedStats {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub denied_requests: u64,
    pub unique_domains: u64,
    pub by_domain: HashMap<String, DomainCounts>,
    pub time_range: Option<TimeRange>,
}

/// Fold a finite sequence of records into an [`AggregatedStats`].
pub fn aggregate<'a, I>(records: I) -> AggregatedStats
where
    I: IntoIterator<Item = &'a AccessLogRecord>,
{
    let mut stats = AggregatedStats::default();

    for record in records {
        stats.total_requests += 1;
        if record.is_allowed {
            stats.allowed_requests += 1;
        } else {
            stats.denied_requests += 1;
        }

        let domain = if record.domain.is_empty() {
            DOMAIN_SENTINEL
        } else {
            record.domain.as_str()
        };
        let counts = stats.by_domain.entry(domain.to_string()).or_default();
        counts.total += 1;
        if record.is_allowed {
            counts.allowed += 1;
        } else {
            counts.denied += 1;
        }

        stats.time_range = Some(match stats.time_range {
            None => TimeRange {
                start: record.timestamp,
                end: record.timestamp,
            },
            Some(range) => TimeRange {
                start: range.start.min(record.timestamp),
                end: range.end.max(record.timestamp),
            },
        });
    }

    stats.unique_domains = stats.by_domain.len() as u64;
    stats
}

impl AggregatedStats {
    /// Domains sorted by total descending, excluding the sentinel; ties
    /// break alphabetically so rendering is stable.
    pub fn domains_by_total(&self) -> Vec<(&str, &DomainCounts)> {
        let mut rows: Vec<(&str, &DomainCounts)> = self
            .by_domain
            .iter()
            .filter(|(domain, _)| domain.as_str() != DOMAIN_SENTINEL)
            .map(|(domain, counts)| (domain.as_str(), counts))
            .collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

//! Property-based tests for the domain policy
//!
//! These establish the matching invariants under case changes and trailing
//! dots, and the stability of port-range parsing.

use crate::domain::DomainPattern;
use crate::ports::HostPortRange;
use proptest::prelude::*;

/// Strategy for generating plausible domain labels
fn label_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,10}"
}

/// Strategy for generating multi-label domains
fn domain_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(label_strategy(), 2..5).prop_map(|labels| labels.join("."))
}

/// Randomly flip ASCII case across a string
fn mixed_case(s: &str, flips: &[bool]) -> String {
    s.chars()
        .zip(flips.iter().cycle())
        .map(|(c, flip)| {
            if *flip {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn matching_invariant_under_trailing_dot(domain in domain_strategy(), sub in label_strategy()) {
        let pattern = DomainPattern::parse(&domain).unwrap().unwrap();
        let host = format!("{}.{}", sub, domain);

        prop_assert!(pattern.matches(&host));
        let host_with_dot = format!("{}.", host);
        prop_assert!(pattern.matches(&host_with_dot));

        let domain_with_dot = format!("{}.", domain);
        let dotted = DomainPattern::parse(&domain_with_dot).unwrap().unwrap();
        prop_assert!(dotted.matches(&host));
        prop_assert_eq!(dotted.canonical(), pattern.canonical());
    }

    #[test]
    fn matching_invariant_under_case(domain in domain_strategy(), flips in prop::collection::vec(any::<bool>(), 1..8)) {
        let pattern = DomainPattern::parse(&domain).unwrap().unwrap();
        let shouted = mixed_case(&domain, &flips);

        let shouted_pattern = DomainPattern::parse(&shouted).unwrap().unwrap();
        prop_assert_eq!(shouted_pattern.canonical(), pattern.canonical());
        prop_assert!(pattern.matches(&shouted));
    }

    #[test]
    fn wildcard_never_matches_bare_domain(domain in domain_strategy()) {
        let wildcard = DomainPattern::parse(&format!("*.{}", domain)).unwrap().unwrap();
        prop_assert!(!wildcard.matches(&domain));
        let sub_domain = format!("x.{}", domain);
        prop_assert!(wildcard.matches(&sub_domain));
    }

    #[test]
    fn suffix_matching_requires_label_boundary(domain in domain_strategy()) {
        let pattern = DomainPattern::parse(&domain).unwrap().unwrap();
        let evil_prefix = format!("evil{}", domain);
        prop_assert!(!pattern.matches(&evil_prefix));
        let evil_suffix = format!("{}.evil.com", domain);
        prop_assert!(!pattern.matches(&evil_suffix));
    }

    #[test]
    fn port_range_display_round_trips(lo in 1u16..=65535, span in 0u16..100) {
        let hi = lo.saturating_add(span);
        let range = HostPortRange::new(lo, hi).unwrap();
        let reparsed = HostPortRange::parse(&range.to_string()).unwrap();
        prop_assert_eq!(range, reparsed);
    }

    #[test]
    fn port_range_contains_is_inclusive(lo in 1u16..=60000, span in 0u16..1000) {
        let hi = lo + span;
        let range = HostPortRange::new(lo, hi).unwrap();
        prop_assert!(range.contains(lo));
        prop_assert!(range.contains(hi));
        if lo > 1 {
            prop_assert!(!range.contains(lo - 1));
        }
        if hi < u16::MAX {
            prop_assert!(!range.contains(hi + 1));
        }
    }
}

//! The PolicySet: an immutable, deduplicated view of the allow-list

use crate::domain::{DomainPattern, PatternKind};
use crate::error::{PolicyError, Result};
use crate::ports::{HostPortRange, DEFAULT_HOST_PORTS};
use awf_types::IpValidator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, info};

/// Google's public resolvers, used when the caller supplies no DNS servers.
const DEFAULT_DNS_SERVERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
];

/// Caller-facing knobs for building a [`PolicySet`].
#[derive(Debug, Clone, Default)]
pub struct PolicyOptions {
    /// DNS server IP literals (IPv4 and/or IPv6).
    pub dns_servers: Vec<String>,
    /// Host-gateway port or `lo-hi` range override.
    pub host_ports: Option<String>,
    /// Force host-gateway visibility even without the localhost keyword.
    pub enable_host_access: bool,
    /// Disable selective mounting and credential hiding.
    pub enable_full_filesystem_access: bool,
}

/// Ordered, deduplicated collection of domain patterns plus the network
/// decisions derived from them. Built once per run and immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySet {
    patterns: Vec<DomainPattern>,
    dns_servers: Vec<IpAddr>,
    host_ports: Option<HostPortRange>,
    enable_host_access: bool,
    enable_full_filesystem_access: bool,
}

impl PolicySet {
    /// Build a policy from raw allow-list entries and options.
    ///
    /// An empty allow-list is accepted and matches no host; everything except
    /// DNS to the trusted servers is then denied.
    pub fn build(domains: &[String], options: PolicyOptions) -> Result<PolicySet> {
        let mut patterns = Vec::new();
        let mut seen = HashSet::new();
        let mut saw_localhost = false;

        for raw in domains {
            let Some(pattern) = DomainPattern::parse(raw)? else {
                debug!(entry = %raw, "dropping empty allow-list entry");
                continue;
            };
            if pattern.kind() == PatternKind::Localhost {
                saw_localhost = true;
            }
            if seen.insert(pattern.dedup_key()) {
                patterns.push(pattern);
            } else {
                debug!(entry = %raw, "dropping duplicate allow-list entry");
            }
        }

        let mut dns_servers = Vec::new();
        for raw in &options.dns_servers {
            let addr = IpValidator::validate(raw)
                .map_err(|_| PolicyError::InvalidDnsServer(raw.clone()))?;
            if !dns_servers.contains(&addr) {
                dns_servers.push(addr);
            }
        }
        if dns_servers.is_empty() {
            dns_servers.extend(DEFAULT_DNS_SERVERS);
        }

        let mut host_ports = match &options.host_ports {
            Some(spec) => Some(HostPortRange::parse(spec)?),
            None => None,
        };

        let mut enable_host_access = options.enable_host_access;
        if saw_localhost {
            enable_host_access = true;
            if host_ports.is_none() {
                host_ports = Some(DEFAULT_HOST_PORTS);
            }
            info!(
                ports = %host_ports.expect("set above"),
                "localhost keyword present: enabling host gateway access"
            );
        }

        Ok(PolicySet {
            patterns,
            dns_servers,
            host_ports,
            enable_host_access,
            enable_full_filesystem_access: options.enable_full_filesystem_access,
        })
    }

    /// Whether any pattern admits `host`.
    pub fn matches(&self, host: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(host))
    }

    pub fn patterns(&self) -> &[DomainPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn dns_servers(&self) -> &[IpAddr] {
        &self.dns_servers
    }

    /// IPv4 resolvers, routed to `iptables`.
    pub fn dns_servers_v4(&self) -> Vec<Ipv4Addr> {
        self.dns_servers
            .iter()
            .filter_map(|a| match a {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            })
            .collect()
    }

    /// IPv6 resolvers, routed to `ip6tables`.
    pub fn dns_servers_v6(&self) -> Vec<Ipv6Addr> {
        self.dns_servers
            .iter()
            .filter_map(|a| match a {
                IpAddr::V6(v6) => Some(*v6),
                IpAddr::V4(_) => None,
            })
            .collect()
    }

    pub fn host_ports(&self) -> Option<HostPortRange> {
        self.host_ports
    }

    pub fn enable_host_access(&self) -> bool {
        self.enable_host_access
    }

    pub fn enable_full_filesystem_access(&self) -> bool {
        self.enable_full_filesystem_access
    }
}

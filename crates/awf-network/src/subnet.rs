//! Private subnet selection for the sandbox bridge network

use crate::error::{NetworkError, Result};
use awf_types::{AGENT_HOST_OCTET, PROXY_HOST_OCTET};
use ipnetwork::{IpNetwork, Ipv4Network};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::debug;

/// The selected sandbox subnet with its static addressing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxSubnet {
    cidr: Ipv4Network,
}

/// Candidate private /24 ranges tried in order.
fn candidate_subnets() -> Vec<Ipv4Network> {
    // The /24s are small enough to rarely collide and large enough for the
    // three static addresses the sandbox needs.
    [
        "172.30.0.0/24",
        "172.31.0.0/24",
        "192.168.100.0/24",
        "192.168.101.0/24",
        "10.100.0.0/24",
        "10.101.0.0/24",
    ]
    .iter()
    .map(|s| s.parse().expect("static candidate subnet"))
    .collect()
}

impl SandboxSubnet {
    /// Use a caller-specified subnet after checking shape and addressability.
    pub fn from_cidr(cidr: &str) -> Result<Self> {
        let network: Ipv4Network = cidr
            .parse()
            .map_err(|_| NetworkError::InvalidSubnet(cidr.to_string()))?;
        if !is_private(network) {
            return Err(NetworkError::InvalidSubnet(format!(
                "{} is not a private range",
                cidr
            )));
        }
        let subnet = Self { cidr: network };
        subnet.check_addressable()?;
        Ok(subnet)
    }

    /// Pick the first candidate subnet that does not overlap any subnet
    /// already claimed by a Docker network.
    pub fn select(used: &HashSet<String>) -> Result<Self> {
        let used_networks: Vec<Ipv4Network> = used
            .iter()
            .filter_map(|s| match s.parse::<IpNetwork>() {
                Ok(IpNetwork::V4(v4)) => Some(v4),
                _ => None,
            })
            .collect();

        for candidate in candidate_subnets() {
            if used_networks.iter().any(|u| candidate.overlaps(*u)) {
                debug!(subnet = %candidate, "candidate subnet in use, skipping");
                continue;
            }
            let subnet = Self { cidr: candidate };
            subnet.check_addressable()?;
            return Ok(subnet);
        }

        Err(NetworkError::NoAvailableSubnets)
    }

    fn check_addressable(&self) -> Result<()> {
        for octet in [1, PROXY_HOST_OCTET, AGENT_HOST_OCTET] {
            if self.cidr.nth(octet as u32).is_none() {
                return Err(NetworkError::UnaddressableHost(
                    self.cidr.to_string(),
                    octet,
                ));
            }
        }
        Ok(())
    }

    pub fn cidr(&self) -> Ipv4Network {
        self.cidr
    }

    /// Bridge gateway, conventionally the first host.
    pub fn gateway_ip(&self) -> Ipv4Addr {
        self.cidr.nth(1).expect("checked at construction")
    }

    /// Static address of the proxy container.
    pub fn proxy_ip(&self) -> Ipv4Addr {
        self.cidr
            .nth(PROXY_HOST_OCTET as u32)
            .expect("checked at construction")
    }

    /// Static address of the init/agent network namespace.
    pub fn agent_ip(&self) -> Ipv4Addr {
        self.cidr
            .nth(AGENT_HOST_OCTET as u32)
            .expect("checked at construction")
    }
}

fn is_private(network: Ipv4Network) -> bool {
    network.network().is_private()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_prefers_first_free_candidate() {
        let subnet = SandboxSubnet::select(&HashSet::new()).unwrap();
        assert_eq!(subnet.cidr().to_string(), "172.30.0.0/24");
        assert_eq!(subnet.proxy_ip(), Ipv4Addr::new(172, 30, 0, 10));
        assert_eq!(subnet.agent_ip(), Ipv4Addr::new(172, 30, 0, 20));
        assert_eq!(subnet.gateway_ip(), Ipv4Addr::new(172, 30, 0, 1));
    }

    #[test]
    fn test_select_skips_conflicting_subnets() {
        let mut used = HashSet::new();
        used.insert("172.30.0.0/16".to_string());
        used.insert("172.31.0.0/24".to_string());
        let subnet = SandboxSubnet::select(&used).unwrap();
        assert_eq!(subnet.cidr().to_string(), "192.168.100.0/24");
    }

    #[test]
    fn test_select_ignores_unparseable_and_v6_subnets() {
        let mut used = HashSet::new();
        used.insert("fd00::/64".to_string());
        used.insert("not-a-subnet".to_string());
        let subnet = SandboxSubnet::select(&used).unwrap();
        assert_eq!(subnet.cidr().to_string(), "172.30.0.0/24");
    }

    #[test]
    fn test_from_cidr_rejects_public_ranges() {
        assert!(SandboxSubnet::from_cidr("8.8.8.0/24").is_err());
        assert!(SandboxSubnet::from_cidr("garbage").is_err());
        assert!(SandboxSubnet::from_cidr("10.10.10.0/24").is_ok());
    }

    #[test]
    fn test_from_cidr_requires_room_for_static_addresses() {
        // /30 has two usable hosts, not enough for .10 and .20.
        assert!(SandboxSubnet::from_cidr("10.0.0.0/30").is_err());
    }
}

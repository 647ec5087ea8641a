//! Deterministic packet-filter rule compilation
//!
//! The compiler turns a policy into the exact `iptables`/`ip6tables`
//! command sequence the init container executes inside the shared network
//! namespace. IPv4 rules must all apply; IPv6 rules degrade to a warning
//! when the kernel lacks `ip6tables`.

use awf_policy::PolicySet;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

/// Compiled rule sets for both IP families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFilterRules {
    v4: Vec<String>,
    v6: Vec<String>,
}

impl PacketFilterRules {
    /// Compile the rules for a policy, pointing the NAT redirect at the
    /// proxy listener.
    pub fn compile(policy: &PolicySet, proxy_ip: Ipv4Addr, proxy_port: u16) -> Self {
        let mut v4 = Vec::new();

        // OUTPUT-NAT-redirect: locally-originated web traffic lands on the
        // proxy no matter where it was headed.
        for port in [80u16, 443] {
            v4.push(format!(
                "iptables -t nat -A OUTPUT -p tcp --dport {} -j DNAT --to-destination {}:{}",
                port, proxy_ip, proxy_port
            ));
        }

        // OUTPUT-FILTER-allow: default-deny with pinholes.
        v4.push("iptables -P OUTPUT DROP".to_string());
        v4.push("iptables -A OUTPUT -o lo -j ACCEPT".to_string());
        v4.push(
            "iptables -A OUTPUT -m state --state ESTABLISHED,RELATED -j ACCEPT".to_string(),
        );
        for dns in policy.dns_servers_v4() {
            v4.push(format!(
                "iptables -A OUTPUT -p udp -d {} --dport 53 -j ACCEPT",
                dns
            ));
            v4.push(format!(
                "iptables -A OUTPUT -p tcp -d {} --dport 53 -j ACCEPT",
                dns
            ));
        }
        v4.push(format!(
            "iptables -A OUTPUT -p tcp -d {} --dport {} -j ACCEPT",
            proxy_ip, proxy_port
        ));
        v4.push("iptables -A OUTPUT -p icmp -j ACCEPT".to_string());
        v4.push("iptables -A OUTPUT -j DROP".to_string());

        // IPv6 sibling: same default-deny shape; DNS pinholes only when the
        // policy actually routes DNS over IPv6. There is no v6 proxy
        // listener, so nothing else is reachable.
        let mut v6 = Vec::new();
        v6.push("ip6tables -P OUTPUT DROP".to_string());
        v6.push("ip6tables -A OUTPUT -o lo -j ACCEPT".to_string());
        v6.push(
            "ip6tables -A OUTPUT -m state --state ESTABLISHED,RELATED -j ACCEPT".to_string(),
        );
        for dns in policy.dns_servers_v6() {
            v6.push(format!(
                "ip6tables -A OUTPUT -p udp -d {} --dport 53 -j ACCEPT",
                dns
            ));
            v6.push(format!(
                "ip6tables -A OUTPUT -p tcp -d {} --dport 53 -j ACCEPT",
                dns
            ));
        }
        v6.push("ip6tables -A OUTPUT -p ipv6-icmp -j ACCEPT".to_string());
        v6.push("ip6tables -A OUTPUT -j DROP".to_string());

        Self { v4, v6 }
    }

    pub fn v4(&self) -> &[String] {
        &self.v4
    }

    pub fn v6(&self) -> &[String] {
        &self.v6
    }

    /// Render the shell script the init container executes. IPv4 failures
    /// abort the script (and so the run); a missing `ip6tables` only warns.
    pub fn render_script(&self) -> String {
        let mut script = String::from("#!/bin/sh\nset -e\n");
        for rule in &self.v4 {
            writeln!(script, "{}", rule).expect("write to string");
        }
        script.push_str("if command -v ip6tables >/dev/null 2>&1; then\n");
        for rule in &self.v6 {
            writeln!(script, "  {}", rule).expect("write to string");
        }
        script.push_str(
            "else\n  echo 'warning: ip6tables not available, skipping IPv6 rules' >&2\nfi\n",
        );
        script
    }
}

//! Proxy configuration rendering
//!
//! The policy is projected into the proxy's native rule syntax. CONNECT is
//! admitted only to ports 80 and 443 (plus the configured host-gateway ports
//! for `host.docker.internal`); plain HTTP is admitted only on port 80 and
//! only for allow-listed hosts. There is no cross-scheme admission: listing a
//! domain admits both schemes on their conventional ports, nothing else.

use awf_policy::PolicySet;
use awf_types::{ACCESS_LOG_CONTAINER_PATH, HOST_GATEWAY, PROXY_PORT};
use std::fmt::Write as _;
use std::net::Ipv4Addr;

/// The proxy's runtime configuration, derived from one policy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    listen_ip: Ipv4Addr,
    listen_port: u16,
    config_text: String,
}

impl ProxyConfig {
    pub fn new(policy: &PolicySet, listen_ip: Ipv4Addr) -> Self {
        Self {
            listen_ip,
            listen_port: PROXY_PORT,
            config_text: render_squid_conf(policy),
        }
    }

    pub fn listen_ip(&self) -> Ipv4Addr {
        self.listen_ip
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// The rendered squid.conf.
    pub fn config_text(&self) -> &str {
        &self.config_text
    }

    /// Proxy URL the agent's environment points at.
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.listen_ip, self.listen_port)
    }
}

fn render_squid_conf(policy: &PolicySet) -> String {
    let dstdomains: Vec<String> = policy
        .patterns()
        .iter()
        .filter_map(|p| p.acl_dstdomain())
        .collect();
    let regexes: Vec<String> = policy
        .patterns()
        .iter()
        .filter_map(|p| p.acl_regex())
        .collect();
    let nameservers: Vec<String> = policy
        .dns_servers()
        .iter()
        .map(|ip| ip.to_string())
        .collect();

    let mut acls = String::new();
    for entry in &dstdomains {
        let _ = writeln!(acls, "acl allowed_dst dstdomain {}", entry);
    }
    for entry in &regexes {
        let _ = writeln!(acls, "acl allowed_dst_re dstdom_regex -i {}", entry);
    }
    let host_ports = policy.host_ports().filter(|_| policy.enable_host_access());
    if let Some(ports) = host_ports {
        let _ = writeln!(acls, "acl host_gateway dstdomain {}", HOST_GATEWAY);
        if ports.start() == ports.end() {
            let _ = writeln!(acls, "acl host_gateway_ports port {}", ports.start());
        } else {
            let _ = writeln!(
                acls,
                "acl host_gateway_ports port {}-{}",
                ports.start(),
                ports.end()
            );
        }
    }

    let mut access = String::new();
    if !dstdomains.is_empty() {
        access.push_str("http_access allow CONNECT allowed_dst connect_ports\n");
        access.push_str("http_access allow !CONNECT allowed_dst plain_port\n");
    }
    if !regexes.is_empty() {
        access.push_str("http_access allow CONNECT allowed_dst_re connect_ports\n");
        access.push_str("http_access allow !CONNECT allowed_dst_re plain_port\n");
    }
    if host_ports.is_some() {
        access.push_str("http_access allow CONNECT host_gateway host_gateway_ports\n");
    }
    access.push_str("http_access deny all\n");

    format!(
        r#"# generated by awf, do not edit
http_port {port}
pid_filename none
cache deny all
access_log {log} awf
logformat awf %ts.%03tu %>a:%>p %{{Host}}>h %<a:%<p %rv %rm %>Hs %Ss:%Sh %ru "%{{User-Agent}}>h"
dns_nameservers {dns}

acl CONNECT method CONNECT
acl connect_ports port 80 443
acl plain_port port 80
{acls}
{access}"#,
        port = PROXY_PORT,
        log = ACCESS_LOG_CONTAINER_PATH,
        dns = nameservers.join(" "),
        acls = acls,
        access = access,
    )
}

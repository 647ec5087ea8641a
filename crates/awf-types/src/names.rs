//! Canonical sandbox names, addresses, and environment overrides
//!
//! Every crate that touches the sandbox agrees on these values; they are the
//! only place a container name or static address is spelled out.

use std::env;

/// Name of the filtering proxy container.
pub const PROXY_CONTAINER: &str = "awf-squid";

/// Name of the init container that holds the shared network namespace and
/// installs the packet-filter rules.
pub const INIT_CONTAINER: &str = "awf-init";

/// Name of the container that runs the user command.
pub const AGENT_CONTAINER: &str = "awf-agent";

/// Name of the private bridge network the sandbox runs on.
pub const NETWORK_NAME: &str = "awf-net";

/// TCP port the proxy listens on inside the sandbox network.
pub const PROXY_PORT: u16 = 3128;

/// Last octet of the proxy's static address within the selected /24.
pub const PROXY_HOST_OCTET: u8 = 10;

/// Last octet of the init/agent static address within the selected /24.
pub const AGENT_HOST_OCTET: u8 = 20;

/// Logical name by which the agent reaches the host gateway.
pub const HOST_GATEWAY: &str = "host.docker.internal";

/// Path of the proxy access log inside the proxy container.
pub const ACCESS_LOG_CONTAINER_PATH: &str = "/var/log/squid/access.log";

/// Basename prefix of preserved log directories (`squid-logs-<unix-ms>`).
pub const PRESERVED_DIR_PREFIX: &str = "squid-logs-";

/// Environment variable naming a preserved log directory.
pub const ENV_LOGS_DIR: &str = "AWF_LOGS_DIR";

/// Environment variable that disables one-shot secret clearing.
pub const ENV_ONE_SHOT_SKIP_UNSET: &str = "AWF_ONE_SHOT_SKIP_UNSET";

/// Environment variable naming the host path of the built one-shot preload
/// library. When set and present, the engine mounts it into the agent and
/// points LD_PRELOAD at it.
pub const ENV_ONESHOT_LIB: &str = "AWF_ONESHOT_LIB";

/// Where the one-shot preload library lands inside the agent container.
pub const ONESHOT_CONTAINER_PATH: &str = "/usr/local/lib/libawf_oneshot.so";

const ENV_SQUID_IMAGE: &str = "AWF_SQUID_IMAGE";
const ENV_INIT_IMAGE: &str = "AWF_INIT_IMAGE";
const ENV_AGENT_IMAGE: &str = "AWF_AGENT_IMAGE";

const DEFAULT_SQUID_IMAGE: &str = "ghcr.io/awf/squid:latest";
const DEFAULT_INIT_IMAGE: &str = "ghcr.io/awf/init:latest";
const DEFAULT_AGENT_IMAGE: &str = "ubuntu:24.04";

/// Image used for the proxy container, overridable via `AWF_SQUID_IMAGE`.
pub fn squid_image() -> String {
    env::var(ENV_SQUID_IMAGE).unwrap_or_else(|_| DEFAULT_SQUID_IMAGE.to_string())
}

/// Image used for the init container, overridable via `AWF_INIT_IMAGE`.
/// The image must ship `iptables` (and `ip6tables` for IPv6 policies).
pub fn init_image() -> String {
    env::var(ENV_INIT_IMAGE).unwrap_or_else(|_| DEFAULT_INIT_IMAGE.to_string())
}

/// Default image used for the agent container when the caller does not pick
/// one, overridable via `AWF_AGENT_IMAGE`.
pub fn agent_image() -> String {
    env::var(ENV_AGENT_IMAGE).unwrap_or_else(|_| DEFAULT_AGENT_IMAGE.to_string())
}

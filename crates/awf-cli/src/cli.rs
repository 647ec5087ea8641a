use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "awf",
    about = "Egress firewall and audit layer for agent workloads",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "Runs a command inside an isolated sandbox where every TCP/TLS \
connection is forced through a filtering proxy, non-proxy traffic is dropped, \
and every decision lands in a structured access log."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Comma-separated domain allow-list (*.example.com wildcards and the
    /// localhost keyword are supported)
    #[arg(long, value_delimiter = ',', value_name = "DOMAINS")]
    pub allow_domains: Vec<String>,

    /// DNS servers the sandbox may query (IPv4/IPv6 literals)
    #[arg(long, value_delimiter = ',', value_name = "IPS")]
    pub dns_servers: Vec<String>,

    /// Host-gateway TCP port or lo-hi range
    #[arg(long, value_name = "RANGE")]
    pub allow_host_ports: Option<String>,

    /// Force host-gateway visibility
    #[arg(long)]
    pub enable_host_access: bool,

    /// Bind mount host:container[:ro|rw] (repeatable)
    #[arg(long = "mount", value_name = "SPEC")]
    pub mounts: Vec<String>,

    /// Working directory inside the agent
    #[arg(long, value_name = "PATH")]
    pub container_workdir: Option<PathBuf>,

    /// Set one environment variable for the agent (KEY=VALUE, repeatable)
    #[arg(long = "env", value_name = "KV")]
    pub env: Vec<String>,

    /// Pass through all caller environment variables
    #[arg(long)]
    pub env_all: bool,

    /// Allocate a pseudo-terminal for the agent
    #[arg(long)]
    pub tty: bool,

    /// Preserve all three containers for inspection after the run
    #[arg(long)]
    pub keep_containers: bool,

    /// Discard the access log at teardown instead of preserving it
    #[arg(long)]
    pub no_preserve_logs: bool,

    /// Disable selective mounting and credential hiding (dangerous)
    #[arg(long)]
    pub allow_full_filesystem_access: bool,

    /// Agent container image
    #[arg(long, value_name = "IMAGE")]
    pub agent_image: Option<String>,

    /// Sandbox subnet override (private CIDR)
    #[arg(long, value_name = "CIDR")]
    pub subnet: Option<String>,

    /// Log verbosity on stderr (debug, info, warn, error)
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: String,

    /// Command to run inside the sandbox, after `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub agent_command: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect proxy access logs
    Logs(LogsArgs),
}

#[derive(clap::Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: Option<LogsCommands>,

    /// Log source: the keyword "running" or a path (defaults to the most
    /// recent source)
    pub source: Option<String>,

    /// Follow the log instead of reading it once
    #[arg(short, long)]
    pub follow: bool,

    /// Output format for log lines
    #[arg(long, default_value = "pretty")]
    pub format: StreamFormat,
}

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Aggregated per-domain statistics
    Stats {
        /// Output format
        #[arg(default_value = "text")]
        format: StatsFormat,
    },
    /// Markdown summary of the most recent log
    Summary,
    /// List available log sources
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFormat {
    Raw,
    Pretty,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsFormat {
    Text,
    Json,
    Markdown,
}

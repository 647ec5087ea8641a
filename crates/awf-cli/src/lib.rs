//! CLI surface for the agent workload firewall

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Commands, LogsArgs, LogsCommands, StatsFormat, StreamFormat};
pub use commands::{handle_logs, run_sandbox};
pub use error::CliError;

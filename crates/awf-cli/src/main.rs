use clap::Parser;
use colored::Colorize;
use std::process;

use awf_cli::{handle_logs, run_sandbox, Cli, Commands};

#[tokio::main]
async fn main() {
    let mut cli = Cli::parse();
    setup_logging(&cli.log_level);

    let exit_code = match cli.command.take() {
        Some(Commands::Logs(args)) => match handle_logs(args).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{} {}", "Error:".red(), e);
                e.exit_code()
            }
        },
        None => match run_sandbox(cli).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{} {}", "Error:".red(), e);
                e.exit_code()
            }
        },
    };

    process::exit(exit_code);
}

/// Process-wide logging goes to stderr; `RUST_LOG` overrides the flag.
fn setup_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

//! Command dispatch: the sandbox run and the logs sub-commands

use crate::cli::{Cli, LogsArgs, LogsCommands, StatsFormat, StreamFormat};
use crate::error::CliError;
use awf_engine::{Engine, RunRequest};
use awf_logs::{
    aggregate, render, JsonFormatter, LogDiscovery, LogSource, LogStreamer, PrettyFormatter,
    RawFormatter, RecordFormatter, StreamOptions,
};
use awf_policy::{MountPlan, PolicyOptions, PolicySet};
use awf_types::EnvVarValidator;
use colored::Colorize;
use tracing::info;

/// Build the policy and mount plan from flags and run the sandbox,
/// returning the process exit code.
pub async fn run_sandbox(cli: Cli) -> Result<i32, CliError> {
    if cli.agent_command.is_empty() {
        return Err(CliError::InvalidInput(
            "no command given; pass it after `--`".to_string(),
        ));
    }

    let policy = PolicySet::build(
        &cli.allow_domains,
        PolicyOptions {
            dns_servers: cli.dns_servers.clone(),
            host_ports: cli.allow_host_ports.clone(),
            enable_host_access: cli.enable_host_access,
            enable_full_filesystem_access: cli.allow_full_filesystem_access,
        },
    )?;

    let mounts = MountPlan::build(&policy, &cli.mounts, cli.container_workdir.clone(), None)?;

    let mut env = Vec::with_capacity(cli.env.len());
    for spec in &cli.env {
        env.push(EnvVarValidator::split_assignment(spec)?);
    }

    let mut request = RunRequest::new(policy, mounts, cli.agent_command.clone());
    request.env = env;
    request.env_all = cli.env_all;
    request.tty = cli.tty;
    request.keep_containers = cli.keep_containers;
    request.preserve_logs = !cli.no_preserve_logs;
    request.agent_image = cli.agent_image.clone();
    request.subnet = cli.subnet.clone();

    let engine = Engine::new()?;
    let outcome = engine.run(request).await?;

    if let Some(path) = &outcome.preserved_logs {
        info!(path = %path.display(), "access log preserved");
        eprintln!("Access log preserved at {}", path.display().to_string().cyan());
    }

    Ok(outcome.exit_code)
}

/// `awf logs ...`
pub async fn handle_logs(args: LogsArgs) -> Result<(), CliError> {
    let discovery = LogDiscovery::new()?;

    match args.command {
        Some(LogsCommands::List) => {
            print!("{}", discovery.format_listing().await);
            Ok(())
        }
        Some(LogsCommands::Stats { format }) => {
            let source = require_source(&discovery, None).await?;
            let streamer = LogStreamer::new()?;
            let records = streamer.read_records(&source).await?;
            let stats = aggregate(&records);
            match format {
                StatsFormat::Text => print!("{}", render::render_stats_text(&stats)),
                StatsFormat::Json => println!(
                    "{}",
                    render::render_stats_json(&stats).map_err(awf_logs::LogError::from)?
                ),
                StatsFormat::Markdown => print!("{}", render::render_stats_markdown(&stats)),
            }
            Ok(())
        }
        Some(LogsCommands::Summary) => {
            let source = require_source(&discovery, None).await?;
            let streamer = LogStreamer::new()?;
            let records = streamer.read_records(&source).await?;
            let stats = aggregate(&records);
            print!("{}", render::render_stats_markdown(&stats));
            Ok(())
        }
        None => {
            let source = require_source(&discovery, args.source.as_deref()).await?;
            let formatter: Box<dyn RecordFormatter> = match args.format {
                StreamFormat::Raw => Box::new(RawFormatter),
                StreamFormat::Pretty => Box::new(PrettyFormatter::auto()),
                StreamFormat::Json => Box::new(JsonFormatter),
            };
            let streamer = LogStreamer::new()?;
            streamer
                .stream(
                    &source,
                    formatter.as_ref(),
                    StreamOptions {
                        follow: args.follow,
                        parse: args.format != StreamFormat::Raw,
                    },
                )
                .await?;
            Ok(())
        }
    }
}

/// Resolve an explicit selection or fall back to the most recent source.
async fn require_source(
    discovery: &LogDiscovery,
    selection: Option<&str>,
) -> Result<LogSource, CliError> {
    match selection {
        Some(selection) => Ok(discovery.validate(selection).await?),
        None => discovery.most_recent().await.ok_or_else(|| {
            CliError::InvalidInput(format!(
                "no log sources found; run a sandbox first or set {}",
                awf_types::ENV_LOGS_DIR
            ))
        }),
    }
}

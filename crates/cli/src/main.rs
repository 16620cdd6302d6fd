mod cli;
mod run;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use teamwork_core::{load_dotenv, TeamsConfig};

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    load_dotenv();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = TeamsConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    config.log_summary();

    match args.command {
        Command::List => {
            for (name, team) in &config.teams {
                let detail = match (team.team_size, team.max_size, team.delegate.as_deref()) {
                    (Some(size), _, _) => format!("team_size={size}"),
                    (_, Some(max), _) => format!("pool={:?} max_size={max}", team.pool).to_lowercase(),
                    (_, _, Some(delegate)) => format!("delegate={delegate}"),
                    _ => String::new(),
                };
                println!("{:<20} {:<20} {}", name, team.kind, detail);
            }
        }
        Command::Run(run_args) => {
            let report = run::run(&config, &run_args)?;
            info!(
                team = %report.team,
                elapsed_ms = report.elapsed_ms as u64,
                threads = report.distinct_threads,
                "run finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Drive a configured team from the command line.
///
/// Loads team definitions from a TOML file, then either lists them or runs
/// a synthetic workload through one of them and reports its metrics.
#[derive(Parser, Debug)]
#[command(name = "teamwork", about = "Run synthetic workloads through configured teams")]
pub struct CliArgs {
    /// Path to the teams config file
    #[arg(long, env = "TEAMWORK_CONFIG", default_value = "config/teams.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every configured team
    List,

    /// Start a team, submit jobs, stop it, and print its metrics as JSON
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Name of the team to run
    #[arg(long)]
    pub team: String,

    /// Number of jobs to submit
    #[arg(long, default_value = "1000")]
    pub jobs: usize,

    /// How long each job sleeps, in milliseconds
    #[arg(long, default_value = "1")]
    pub job_ms: u64,

    /// Drive a process_context team through this many context threads
    #[arg(long)]
    pub processes: Option<usize>,
}

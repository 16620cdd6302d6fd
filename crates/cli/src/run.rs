use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use teamwork_core::{
    FnJob, Job, ProcessContextListener, ProcessIdentifier, Team, TeamError, TeamKind,
    TeamMetrics, TeamsConfig,
};
use teamwork_teams::{ProcessCompletion, ProcessContextOptions, ProcessContextTeam, TeamSource};

use crate::cli::RunArgs;

/// Upper bound on waiting for detached workers to finish after `stop_working`.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// What `teamwork run` prints.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub team: String,
    pub kind: TeamKind,
    pub jobs_submitted: usize,
    pub jobs_finished: usize,
    /// Jobs handed back through their cancellation channel.
    pub jobs_cancelled: u64,
    pub distinct_threads: usize,
    pub elapsed_ms: u128,
    pub metrics: TeamMetrics,
}

/// Synthetic jobs that record which thread ran them.
struct Workload {
    job_ms: u64,
    threads: Arc<Mutex<HashSet<ThreadId>>>,
    /// Jobs that ran or were cancelled.
    settled: Arc<AtomicUsize>,
    ran: Arc<AtomicUsize>,
}

impl Workload {
    fn new(job_ms: u64) -> Self {
        Self {
            job_ms,
            threads: Arc::new(Mutex::new(HashSet::new())),
            settled: Arc::new(AtomicUsize::new(0)),
            ran: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn job(&self, index: usize, process: Option<ProcessIdentifier>) -> Box<dyn Job> {
        let job_ms = self.job_ms;
        let threads = Arc::clone(&self.threads);
        let settled = Arc::clone(&self.settled);
        let ran = Arc::clone(&self.ran);
        let cancelled = Arc::clone(&self.settled);

        let job = FnJob::new(move |_| {
            if job_ms > 0 {
                thread::sleep(Duration::from_millis(job_ms));
            }
            threads.lock().insert(thread::current().id());
            ran.fetch_add(1, Ordering::SeqCst);
            settled.fetch_add(1, Ordering::SeqCst);
        })
        .with_name(format!("job-{index}"))
        .on_cancel(move |_| {
            cancelled.fetch_add(1, Ordering::SeqCst);
        });

        match process {
            Some(process) => job.with_process(process).boxed(),
            None => job.boxed(),
        }
    }

    /// Wait until `count` jobs have settled. Returns `false` on timeout.
    fn wait_settled(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.settled.load(Ordering::SeqCst) < count {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn report(&self, team: &dyn Team, kind: TeamKind, jobs: usize, started: Instant) -> RunReport {
        let metrics = team.metrics();
        RunReport {
            team: team.name().to_string(),
            kind,
            jobs_submitted: jobs,
            jobs_finished: self.ran.load(Ordering::SeqCst),
            jobs_cancelled: metrics.jobs_cancelled(),
            distinct_threads: self.threads.lock().len(),
            elapsed_ms: started.elapsed().as_millis(),
            metrics,
        }
    }
}

pub fn run(config: &TeamsConfig, args: &RunArgs) -> Result<RunReport> {
    let team_config = config
        .team(&args.team)
        .with_context(|| format!("unknown team '{}'", args.team))?;

    match args.processes {
        Some(0) => bail!("--processes must be at least 1"),
        Some(processes) if team_config.kind == TeamKind::ProcessContext => {
            team_config.validate(&args.team)?;
            let team = Arc::new(ProcessContextTeam::new(
                args.team.as_str(),
                ProcessContextOptions::from_config(team_config),
            ));
            run_processes(team, args, processes)
        }
        Some(_) => bail!(
            "--processes requires a process_context team, '{}' is {}",
            args.team,
            team_config.kind
        ),
        None => {
            let team = TeamSource::new().create_team(&args.team, team_config, config)?;
            run_plain(team.as_ref(), team_config.kind, args)
        }
    }
}

fn run_plain(team: &dyn Team, kind: TeamKind, args: &RunArgs) -> Result<RunReport> {
    let workload = Workload::new(args.job_ms);
    team.start_working()?;
    info!(team = %team.name(), jobs = args.jobs, "submitting jobs");

    let started = Instant::now();
    for index in 0..args.jobs {
        team.assign_job(workload.job(index, None));
    }
    team.stop_working();

    // Per-job strategies only advise their threads to stop.
    if !workload.wait_settled(args.jobs, SETTLE_TIMEOUT) {
        warn!(team = %team.name(), "not every job settled before reporting");
    }
    Ok(workload.report(team, kind, args.jobs, started))
}

fn run_processes(
    team: Arc<ProcessContextTeam>,
    args: &RunArgs,
    processes: usize,
) -> Result<RunReport> {
    let workload = Workload::new(args.job_ms);
    team.start_working()?;

    let (ready_tx, ready_rx) = mpsc::channel();
    let mut contexts: Vec<JoinHandle<Result<(), TeamError>>> = Vec::with_capacity(processes);
    for index in 0..processes {
        let team = Arc::clone(&team);
        let ready_tx = ready_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-context-{}", team.name(), index))
            .spawn(move || {
                team.do_process(|completion| {
                    let process = ProcessIdentifier::new();
                    team.process_created(process);
                    let _ = ready_tx.send((process, completion));
                })
            })
            .context("failed to spawn context thread")?;
        contexts.push(handle);
    }
    drop(ready_tx);

    let bound: Vec<(ProcessIdentifier, ProcessCompletion)> =
        ready_rx.iter().take(processes).collect();
    info!(team = %team.name(), processes = bound.len(), jobs = args.jobs, "submitting jobs");

    let started = Instant::now();
    if !bound.is_empty() {
        for index in 0..args.jobs {
            let (process, _) = &bound[index % bound.len()];
            team.assign_job(workload.job(index, Some(*process)));
        }
        if !workload.wait_settled(args.jobs, SETTLE_TIMEOUT) {
            warn!(team = %team.name(), "not every routed job ran before completing processes");
        }
    }

    for (process, completion) in &bound {
        completion.complete();
        team.process_completed(*process);
    }
    for handle in contexts {
        handle
            .join()
            .map_err(|_| anyhow!("context thread panicked"))??;
    }
    team.stop_working();

    if bound.len() < processes {
        bail!("only {} of {} context threads started", bound.len(), processes);
    }
    Ok(workload.report(team.as_ref(), TeamKind::ProcessContext, args.jobs, started))
}

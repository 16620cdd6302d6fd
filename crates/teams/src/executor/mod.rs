//! Thread-pool backed team with a bounded graceful shutdown.
//!
//! Two pools are available: [`FixedExecutor`] (a rayon pool of constant
//! size) and [`ElasticExecutor`] (grows to a ceiling and evicts idle
//! threads after a keep-alive). Both sit behind the [`Executor`] trait.

mod elastic;
mod fixed;

pub use elastic::ElasticExecutor;
pub use fixed::FixedExecutor;

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use teamwork_core::{Job, Team, TeamControl, TeamError, TeamMetrics, ThreadPriority};

use crate::worker::{deadline_after, expired, remaining_until};

/// Granularity of the drain and termination polls.
pub(crate) const TERMINATION_POLL: Duration = Duration::from_millis(10);

/// A job the pool refused, handed back so the team can cancel it.
pub struct Rejected {
    pub job: Box<dyn Job>,
    pub reason: String,
}

impl Rejected {
    pub fn new(job: Box<dyn Job>, reason: impl Into<String>) -> Self {
        Self {
            job,
            reason: reason.into(),
        }
    }
}

/// The pool an [`ExecutorTeam`] submits jobs to.
pub trait Executor: Send + Sync {
    /// Accept a job for asynchronous execution or hand it back.
    fn execute(&self, job: Box<dyn Job>) -> Result<(), Rejected>;

    /// Accepted jobs not yet started.
    fn queued(&self) -> usize;

    /// Jobs currently running.
    fn active(&self) -> usize;

    /// Refuse new jobs. Already accepted jobs still run.
    fn shutdown(&self);

    /// Wait until every accepted job has finished. Returns `false` on timeout.
    fn await_termination(&self, timeout: Duration) -> bool;

    /// Refuse new jobs and cancel every job that has not started yet.
    fn shutdown_now(&self);
}

/// Pool shape of an [`ExecutorTeam`].
#[derive(Debug, Clone)]
pub enum PoolSpec {
    Fixed {
        size: usize,
        queue_capacity: Option<usize>,
    },
    Cached {
        min_size: usize,
        max_size: usize,
        keep_alive: Duration,
        queue_capacity: Option<usize>,
    },
}

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub pool: PoolSpec,
    /// Upper bound on how long `stop_working` waits for accepted jobs.
    pub max_shutdown_wait: Duration,
    pub thread_priority: ThreadPriority,
}

impl ExecutorOptions {
    pub fn fixed(size: usize) -> Self {
        Self {
            pool: PoolSpec::Fixed {
                size,
                queue_capacity: None,
            },
            max_shutdown_wait: Duration::from_secs(10),
            thread_priority: ThreadPriority::Normal,
        }
    }

    pub fn cached(min_size: usize, max_size: usize, keep_alive: Duration) -> Self {
        Self {
            pool: PoolSpec::Cached {
                min_size,
                max_size,
                keep_alive,
                queue_capacity: None,
            },
            max_shutdown_wait: Duration::from_secs(10),
            thread_priority: ThreadPriority::Normal,
        }
    }

    pub fn with_max_shutdown_wait(mut self, wait: Duration) -> Self {
        self.max_shutdown_wait = wait;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        match &mut self.pool {
            PoolSpec::Fixed { queue_capacity, .. } | PoolSpec::Cached { queue_capacity, .. } => {
                *queue_capacity = Some(capacity)
            }
        }
        self
    }
}

/// Delegates jobs to a thread pool created on `start_working`.
pub struct ExecutorTeam {
    control: Arc<TeamControl>,
    options: ExecutorOptions,
    executor: OnceLock<Box<dyn Executor>>,
}

impl ExecutorTeam {
    pub fn new(name: impl Into<String>, options: ExecutorOptions) -> Self {
        Self {
            control: Arc::new(TeamControl::new(name)),
            options,
            executor: OnceLock::new(),
        }
    }

    /// Accepted jobs waiting for a pool thread.
    pub fn queued(&self) -> usize {
        self.executor.get().map_or(0, |e| e.queued())
    }

    /// Jobs running on pool threads.
    pub fn active(&self) -> usize {
        self.executor.get().map_or(0, |e| e.active())
    }

    fn build_executor(&self) -> Result<Box<dyn Executor>, TeamError> {
        let control = Arc::clone(&self.control);
        Ok(match self.options.pool {
            PoolSpec::Fixed {
                size,
                queue_capacity,
            } => Box::new(FixedExecutor::new(control, size, queue_capacity)?),
            PoolSpec::Cached {
                min_size,
                max_size,
                keep_alive,
                queue_capacity,
            } => Box::new(ElasticExecutor::new(
                control,
                min_size,
                max_size,
                keep_alive,
                queue_capacity,
            )?),
        })
    }

    /// Wait for the pool to go idle, at most until `deadline`.
    fn drain(&self, executor: &dyn Executor, deadline: Option<Instant>) {
        while executor.queued() + executor.active() > 0 && !expired(deadline) {
            thread::sleep(TERMINATION_POLL);
        }
    }
}

impl Team for ExecutorTeam {
    fn name(&self) -> &str {
        self.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.control.begin()?;
        self.options.thread_priority.note_unsupported(self.control.name());

        match self.build_executor() {
            Ok(executor) => {
                let _ = self.executor.set(executor);
                info!(team = %self.control.name(), pool = ?self.options.pool, "executor started");
                Ok(())
            }
            Err(e) => {
                self.control.request_stop();
                Err(e)
            }
        }
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        let Some(job) = self.control.accept(job) else {
            return;
        };
        let Some(executor) = self.executor.get() else {
            self.control.reject(job, "executor not running");
            return;
        };
        if let Err(rejected) = executor.execute(job) {
            self.control.reject(rejected.job, rejected.reason);
        }
    }

    fn stop_working(&self) {
        if !self.control.request_stop() {
            return;
        }
        let Some(executor) = self.executor.get() else {
            return;
        };

        let max_wait = self.options.max_shutdown_wait;
        let deadline = deadline_after(max_wait);
        self.drain(executor.as_ref(), deadline);

        executor.shutdown();
        if executor.await_termination(remaining_until(deadline)) {
            info!(team = %self.control.name(), "executor terminated");
            return;
        }

        warn!(
            team = %self.control.name(),
            waited = ?max_wait,
            queued = executor.queued(),
            active = executor.active(),
            "executor did not terminate within shutdown wait, abandoning queued jobs"
        );
        self.control.record_shutdown_timeout();
        executor.shutdown_now();
    }

    fn metrics(&self) -> TeamMetrics {
        self.control.metrics()
    }
}

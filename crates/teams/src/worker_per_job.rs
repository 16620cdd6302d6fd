//! Strategies with no pooling at all: every job gets a brand-new thread.
//!
//! Threads are detached (their handles are dropped), so a slow job never
//! holds up the container. `stop_working` is advisory: it clears the
//! "continue working" flag that jobs can observe through their context.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use teamwork_core::{Job, Team, TeamControl, TeamError, TeamMetrics, ThreadPriority};

use crate::worker::spawn_worker;

#[derive(Debug, Clone, Copy)]
enum ThreadNaming {
    /// `<team>-job-<n>`
    Sequence,
    /// `<team>-<job name>`
    JobName,
}

/// Decrements the live-worker count when a spawned thread finishes.
struct LiveWorker(Arc<AtomicUsize>);

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SpawningTeam {
    control: Arc<TeamControl>,
    thread_priority: ThreadPriority,
    naming: ThreadNaming,
    spawned: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl SpawningTeam {
    fn new(name: String, thread_priority: ThreadPriority, naming: ThreadNaming) -> Self {
        Self {
            control: Arc::new(TeamControl::new(name)),
            thread_priority,
            naming,
            spawned: AtomicU64::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn start(&self) -> Result<(), TeamError> {
        self.control.begin()?;
        self.thread_priority.note_unsupported(self.control.name());
        Ok(())
    }

    fn assign(&self, job: Box<dyn Job>) {
        let Some(job) = self.control.accept(job) else {
            return;
        };

        let sequence = self.spawned.fetch_add(1, Ordering::Relaxed);
        let thread_name = match self.naming {
            ThreadNaming::Sequence => format!("{}-job-{}", self.control.name(), sequence),
            ThreadNaming::JobName => {
                format!("{}-{}", self.control.name(), job.name()).replace('\0', "")
            }
        };
        debug!(team = %self.control.name(), thread = %thread_name, "spawning worker for job");

        // The slot lets a failed spawn hand the job back for cancellation.
        let slot = Arc::new(Mutex::new(Some(job)));
        let worker_slot = Arc::clone(&slot);
        let control = Arc::clone(&self.control);
        let live = Arc::clone(&self.live);
        self.live.fetch_add(1, Ordering::SeqCst);

        let spawned = spawn_worker(self.control.name(), thread_name, move || {
            let _live = LiveWorker(live);
            let job = worker_slot.lock().take();
            if let Some(job) = job {
                control.execute(job);
            }
        });

        if let Err(e) = spawned {
            self.live.fetch_sub(1, Ordering::SeqCst);
            let job = slot.lock().take();
            if let Some(job) = job {
                self.control.reject(job, e.to_string());
            }
        }
    }
}

/// Spawns one thread per job, named `<team>-job-<n>`.
pub struct WorkerPerJobTeam {
    inner: SpawningTeam,
}

impl WorkerPerJobTeam {
    pub fn new(name: impl Into<String>, thread_priority: ThreadPriority) -> Self {
        Self {
            inner: SpawningTeam::new(name.into(), thread_priority, ThreadNaming::Sequence),
        }
    }

    /// Threads currently running a job.
    pub fn active_workers(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
}

impl Team for WorkerPerJobTeam {
    fn name(&self) -> &str {
        self.inner.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.inner.start()
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        self.inner.assign(job);
    }

    fn stop_working(&self) {
        self.inner.control.request_stop();
    }

    fn metrics(&self) -> TeamMetrics {
        self.inner.control.metrics()
    }
}

/// Spawns one thread per job, named after the job so each task is
/// identifiable in thread dumps and logs.
pub struct WorkerPerTaskTeam {
    inner: SpawningTeam,
}

impl WorkerPerTaskTeam {
    pub fn new(name: impl Into<String>, thread_priority: ThreadPriority) -> Self {
        Self {
            inner: SpawningTeam::new(name.into(), thread_priority, ThreadNaming::JobName),
        }
    }

    /// Threads currently running a job.
    pub fn active_workers(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
}

impl Team for WorkerPerTaskTeam {
    fn name(&self) -> &str {
        self.inner.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.inner.start()
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        self.inner.assign(job);
    }

    fn stop_working(&self) {
        self.inner.control.request_stop();
    }

    fn metrics(&self) -> TeamMetrics {
        self.inner.control.metrics()
    }
}

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use teamwork_core::{Job, TeamControl, TeamError};

use super::{Executor, Rejected, TERMINATION_POLL};
use crate::worker::{deadline_after, expired};

/// Jobs and accounting shared with every closure spawned onto the pool.
#[derive(Default)]
struct Shared {
    /// Accepted jobs no pool thread has picked up yet.
    jobs: Mutex<VecDeque<Box<dyn Job>>>,
    /// Accepted and not yet finished or abandoned.
    pending: AtomicUsize,
    /// Currently running.
    active: AtomicUsize,
}

impl Shared {
    /// Run the oldest queued job, if `shutdown_now` has not taken it.
    fn run_next(&self, control: &TeamControl) {
        let job = {
            let mut jobs = self.jobs.lock();
            let job = jobs.pop_front();
            if job.is_some() {
                self.active.fetch_add(1, Ordering::SeqCst);
            }
            job
        };
        let Some(job) = job else {
            return;
        };
        control.execute(job);
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool on top of a `rayon::ThreadPool`.
///
/// Jobs wait in a queue owned by the executor and every closure spawned
/// onto rayon pops one of them, so `shutdown_now` can take back whatever
/// has not started. Rayon has no queue bound, so admission is enforced
/// here: at most `size + queue_capacity` jobs are accepted and not yet
/// finished.
pub struct FixedExecutor {
    control: Arc<TeamControl>,
    pool: Mutex<Option<rayon::ThreadPool>>,
    shut_down: AtomicBool,
    limit: usize,
    shared: Arc<Shared>,
}

impl FixedExecutor {
    pub fn new(
        control: Arc<TeamControl>,
        size: usize,
        queue_capacity: Option<usize>,
    ) -> Result<Self, TeamError> {
        let team = control.name().to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(move |i| format!("{}-pool-{}", team, i))
            .build()
            .map_err(|e| TeamError::Spawn {
                team: control.name().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            control,
            pool: Mutex::new(Some(pool)),
            shut_down: AtomicBool::new(false),
            limit: size.saturating_add(queue_capacity.unwrap_or(usize::MAX)),
            shared: Arc::new(Shared::default()),
        })
    }

    fn is_idle(&self) -> bool {
        self.shared.pending.load(Ordering::SeqCst) == 0
    }
}

impl Executor for FixedExecutor {
    fn execute(&self, job: Box<dyn Job>) -> Result<(), Rejected> {
        // Held until the job is queued so `shutdown` cannot slip in between.
        let pool = self.pool.lock();
        let Some(pool) = pool.as_ref().filter(|_| !self.shut_down.load(Ordering::SeqCst)) else {
            return Err(Rejected::new(job, "executor is shut down"));
        };

        let limit = self.limit;
        let admitted = self
            .shared
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1));
        if admitted.is_err() {
            return Err(Rejected::new(job, format!("pool saturated ({} jobs in flight)", limit)));
        }

        self.shared.jobs.lock().push_back(job);
        let shared = Arc::clone(&self.shared);
        let control = Arc::clone(&self.control);
        pool.spawn(move || shared.run_next(&control));
        Ok(())
    }

    fn queued(&self) -> usize {
        self.shared.jobs.lock().len()
    }

    fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        let _pool = self.pool.lock();
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        while !self.is_idle() {
            if expired(deadline) {
                return false;
            }
            thread::sleep(TERMINATION_POLL);
        }
        // Idle and shut down: release the rayon threads.
        if self.shut_down.load(Ordering::SeqCst) {
            self.pool.lock().take();
        }
        true
    }

    fn shutdown_now(&self) {
        self.shutdown();
        let abandoned: Vec<_> = self.shared.jobs.lock().drain(..).collect();
        self.shared.pending.fetch_sub(abandoned.len(), Ordering::SeqCst);
        for job in abandoned {
            self.control.abandon(job);
        }
    }
}

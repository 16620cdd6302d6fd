use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use teamwork_core::{Job, TeamControl, TeamError};

use super::{Executor, Rejected};
use crate::worker::{deadline_after, spawn_worker};

struct PoolState {
    queue: VecDeque<Box<dyn Job>>,
    threads: usize,
    idle: usize,
    active: usize,
    shut_down: bool,
    spawned: u64,
}

struct Shared {
    control: Arc<TeamControl>,
    state: Mutex<PoolState>,
    /// Signalled when work arrives or the pool shuts down.
    work: Condvar,
    /// Signalled when the last thread exits.
    terminated: Condvar,
    min_size: usize,
    max_size: usize,
    keep_alive: Duration,
    capacity: usize,
}

/// Pool that grows on demand up to `max_size` threads and lets threads
/// above `min_size` exit after `keep_alive` without work.
///
/// A new job goes to an idle thread if there is one, else to a new thread
/// while under the ceiling, else to the bounded queue.
pub struct ElasticExecutor {
    shared: Arc<Shared>,
}

impl ElasticExecutor {
    pub fn new(
        control: Arc<TeamControl>,
        min_size: usize,
        max_size: usize,
        keep_alive: Duration,
        queue_capacity: Option<usize>,
    ) -> Result<Self, TeamError> {
        let shared = Arc::new(Shared {
            control,
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                threads: 0,
                idle: 0,
                active: 0,
                shut_down: false,
                spawned: 0,
            }),
            work: Condvar::new(),
            terminated: Condvar::new(),
            min_size,
            max_size: max_size.max(1),
            keep_alive,
            capacity: queue_capacity.unwrap_or(usize::MAX),
        });

        // Core threads are started eagerly.
        for _ in 0..min_size {
            let mut state = shared.state.lock();
            if let Err(e) = Shared::add_core_thread(&shared, &mut state) {
                state.shut_down = true;
                shared.work.notify_all();
                return Err(e);
            }
        }
        Ok(Self { shared })
    }

    /// Threads currently alive.
    pub fn threads(&self) -> usize {
        self.shared.state.lock().threads
    }
}

impl Shared {
    /// Start an idle core thread. Called with the state lock held.
    fn add_core_thread(shared: &Arc<Shared>, state: &mut PoolState) -> Result<(), TeamError> {
        let thread_name = format!("{}-pool-{}", shared.control.name(), state.spawned);
        let worker = Arc::clone(shared);
        spawn_worker(shared.control.name(), thread_name, move || worker.work(None))?;
        state.spawned += 1;
        state.threads += 1;
        Ok(())
    }

    fn work(&self, first: Option<Box<dyn Job>>) {
        let mut state = self.state.lock();
        if let Some(job) = first {
            MutexGuard::unlocked(&mut state, || {
                self.control.execute(job);
            });
            state.active -= 1;
        }

        loop {
            if let Some(job) = state.queue.pop_front() {
                state.active += 1;
                MutexGuard::unlocked(&mut state, || {
                    self.control.execute(job);
                });
                state.active -= 1;
                continue;
            }
            if state.shut_down {
                break;
            }

            state.idle += 1;
            let timed_out = self.work.wait_for(&mut state, self.keep_alive).timed_out();
            state.idle -= 1;

            if timed_out && state.queue.is_empty() && state.threads > self.min_size {
                debug!(team = %self.control.name(), "evicting idle pool thread");
                break;
            }
        }

        state.threads -= 1;
        if state.threads == 0 {
            self.terminated.notify_all();
        }
    }
}

impl Executor for ElasticExecutor {
    fn execute(&self, job: Box<dyn Job>) -> Result<(), Rejected> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.shut_down {
            return Err(Rejected::new(job, "executor is shut down"));
        }

        if state.idle > state.queue.len() {
            state.queue.push_back(job);
            shared.work.notify_one();
            return Ok(());
        }

        if state.threads < shared.max_size {
            // A failed spawn falls through to the queue; the slot returns the job.
            let slot = Arc::new(Mutex::new(Some(job)));
            let worker_slot = Arc::clone(&slot);
            let thread_name = format!("{}-pool-{}", shared.control.name(), state.spawned);
            let worker = Arc::clone(shared);
            state.active += 1;
            let spawned = spawn_worker(shared.control.name(), thread_name, move || {
                let first = worker_slot.lock().take();
                worker.work(first)
            });
            match spawned {
                Ok(_) => {
                    state.spawned += 1;
                    state.threads += 1;
                    return Ok(());
                }
                Err(e) => {
                    state.active -= 1;
                    let Some(job) = slot.lock().take() else {
                        return Ok(());
                    };
                    if state.threads == 0 {
                        return Err(Rejected::new(job, e.to_string()));
                    }
                    return self.enqueue(state, job);
                }
            }
        }

        self.enqueue(state, job)
    }

    fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    fn active(&self) -> usize {
        self.shared.state.lock().active
    }

    fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.shut_down = true;
        self.shared.work.notify_all();
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        let mut state = self.shared.state.lock();
        while state.threads > 0 {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .terminated
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return state.threads == 0;
                    }
                }
                None => self.shared.terminated.wait(&mut state),
            }
        }
        true
    }

    fn shutdown_now(&self) {
        let abandoned: Vec<Box<dyn Job>> = {
            let mut state = self.shared.state.lock();
            state.shut_down = true;
            self.shared.work.notify_all();
            state.queue.drain(..).collect()
        };
        for job in abandoned {
            self.shared.control.abandon(job);
        }
    }
}

impl ElasticExecutor {
    fn enqueue(&self, mut state: MutexGuard<'_, PoolState>, job: Box<dyn Job>) -> Result<(), Rejected> {
        if state.queue.len() >= self.shared.capacity {
            return Err(Rejected::new(
                job,
                format!("pool saturated ({} threads, {} queued)", state.threads, state.queue.len()),
            ));
        }
        state.queue.push_back(job);
        self.shared.work.notify_one();
        Ok(())
    }
}

impl Drop for ElasticExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Lock-guarded FIFO of pending jobs.
//!
//! Every operation takes the queue's single mutex; the paired condition
//! variable is the only way a consumer blocks. Hold times are O(1): jobs are
//! never run while the lock is held.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::job::Job;

/// Thread-safe FIFO queue of boxed jobs with bounded blocking dequeue.
#[derive(Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Box<dyn Job>>>,
    signal: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. Wakes one waiter if the queue was empty.
    pub fn enqueue(&self, job: Box<dyn Job>) {
        let mut jobs = self.jobs.lock();
        let was_empty = jobs.is_empty();
        jobs.push_back(job);
        if was_empty {
            self.signal.notify_one();
        }
    }

    /// Pop the head without blocking.
    pub fn dequeue(&self) -> Option<Box<dyn Job>> {
        self.jobs.lock().pop_front()
    }

    /// Pop the head, waiting at most `timeout` for one to arrive.
    ///
    /// Waits once and retries once. A spurious or empty wake-up returns
    /// `None` rather than waiting again, which bounds the caller's latency.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<Box<dyn Job>> {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.pop_front() {
            return Some(job);
        }
        self.signal.wait_for(&mut jobs, timeout);
        jobs.pop_front()
    }

    /// Wake one waiter without enqueueing anything.
    pub fn wake_up(&self) {
        let _jobs = self.jobs.lock();
        self.signal.notify_one();
    }

    /// Wait up to `timeout` for a job or a wake-up, without consuming.
    ///
    /// Returns `true` if a job is available afterwards.
    pub fn wait_for_task(&self, timeout: Duration) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.is_empty() {
            self.signal.wait_for(&mut jobs, timeout);
        }
        !jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Remove every queued job, in FIFO order.
    pub fn drain(&self) -> Vec<Box<dyn Job>> {
        self.jobs.lock().drain(..).collect()
    }
}

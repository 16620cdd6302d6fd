use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use teamwork_core::{Job, JobQueue, TeamControl};

/// Queue of jobs bound to one originating thread. Only that thread
/// dequeues from it.
pub(crate) struct JobQueueExecutor {
    thread: ThreadId,
    queue: JobQueue,
}

impl JobQueueExecutor {
    pub(crate) fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            queue: JobQueue::new(),
        }
    }

    pub(crate) fn thread(&self) -> ThreadId {
        self.thread
    }

    pub(crate) fn enqueue(&self, job: Box<dyn Job>) {
        self.queue.enqueue(job);
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run routed jobs on the current thread until `completion` fires.
    pub(crate) fn run_until_complete(
        &self,
        control: &TeamControl,
        completion: &ProcessCompletion,
        wait_time: Duration,
    ) {
        while !completion.is_complete() {
            if let Some(job) = self.queue.dequeue_timeout(wait_time) {
                control.execute(job);
            }
        }
    }

    /// Take every job still queued.
    pub(crate) fn drain(&self) -> Vec<Box<dyn Job>> {
        self.queue.drain()
    }

    fn wake_up(&self) {
        self.queue.wake_up();
    }
}

/// Handle a process body uses to signal that its work is done.
///
/// Cloneable and `Send`, so completion may be signalled from a job or from
/// any other thread.
#[derive(Clone)]
pub struct ProcessCompletion {
    complete: Arc<AtomicBool>,
    executor: Arc<JobQueueExecutor>,
}

impl ProcessCompletion {
    pub(crate) fn new(executor: Arc<JobQueueExecutor>) -> Self {
        Self {
            complete: Arc::new(AtomicBool::new(false)),
            executor,
        }
    }

    /// Release the thread blocked in `do_process`.
    pub fn complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
        self.executor.wake_up();
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }
}

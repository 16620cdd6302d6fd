use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;

use teamwork_core::{Job, ProcessIdentifier};

use super::executor::JobQueueExecutor;

#[derive(Default)]
struct Registry {
    /// Logical process -> thread that created it.
    processes: HashMap<ProcessIdentifier, ThreadId>,
    /// Thread currently inside `do_process` -> its executor.
    executors: HashMap<ThreadId, Arc<JobQueueExecutor>>,
}

/// Both affinity maps behind one lock. Routing enqueues while holding it,
/// so the lock order is always registry then queue.
#[derive(Default)]
pub(crate) struct ProcessRegistry {
    inner: Mutex<Registry>,
}

impl ProcessRegistry {
    /// Returns `false` if the thread already has an executor.
    pub(crate) fn register_thread(&self, executor: Arc<JobQueueExecutor>) -> bool {
        let mut inner = self.inner.lock();
        if inner.executors.contains_key(&executor.thread()) {
            return false;
        }
        inner.executors.insert(executor.thread(), executor);
        true
    }

    pub(crate) fn unregister_thread(&self, thread: ThreadId) -> Option<Arc<JobQueueExecutor>> {
        self.inner.lock().executors.remove(&thread)
    }

    pub(crate) fn bind(&self, process: ProcessIdentifier, thread: ThreadId) {
        self.inner.lock().processes.insert(process, thread);
    }

    pub(crate) fn unbind(&self, process: &ProcessIdentifier) -> Option<ThreadId> {
        self.inner.lock().processes.remove(process)
    }

    pub(crate) fn thread_of(&self, process: &ProcessIdentifier) -> Option<ThreadId> {
        self.inner.lock().processes.get(process).copied()
    }

    /// Queue the job on its process's originating thread, or hand it back
    /// if that thread is not running a process for this team.
    pub(crate) fn route(
        &self,
        process: &ProcessIdentifier,
        job: Box<dyn Job>,
    ) -> Result<(), Box<dyn Job>> {
        let inner = self.inner.lock();
        let executor = inner
            .processes
            .get(process)
            .and_then(|thread| inner.executors.get(thread));
        match executor {
            Some(executor) => {
                executor.enqueue(job);
                Ok(())
            }
            None => Err(job),
        }
    }

    /// Jobs routed but not yet run, across every registered thread.
    pub(crate) fn pending_jobs(&self) -> usize {
        self.inner.lock().executors.values().map(|e| e.pending()).sum()
    }

    pub(crate) fn bound_processes(&self) -> usize {
        self.inner.lock().processes.len()
    }
}

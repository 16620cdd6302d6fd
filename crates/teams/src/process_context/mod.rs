//! Routes jobs back to the thread that created their logical process.
//!
//! A thread enters [`ProcessContextTeam::do_process`], which registers an
//! executor for it and blocks running routed jobs until the process body
//! signals completion. The container reports process lifecycle through
//! [`ProcessContextListener`]; a job whose process is bound to a thread
//! inside `do_process` is queued there, anything else runs passively on the
//! assigning thread.

mod executor;
mod registry;

pub use executor::ProcessCompletion;

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::{debug, info, warn};

use teamwork_core::{
    Job, ProcessContextListener, ProcessIdentifier, Team, TeamConfig, TeamControl, TeamError,
    TeamMetrics,
};

use executor::JobQueueExecutor;
use registry::ProcessRegistry;

use crate::worker::{deadline_after, expired};

#[derive(Debug, Clone)]
pub struct ProcessContextOptions {
    /// How long `do_process` blocks on its queue before re-checking completion.
    pub wait_time: Duration,
    /// Sleep between checks while `stop_working` waits for routed jobs.
    pub shutdown_poll: Duration,
    pub max_shutdown_wait: Duration,
}

impl ProcessContextOptions {
    pub fn from_config(config: &TeamConfig) -> Self {
        Self {
            wait_time: config.wait_time(),
            shutdown_poll: config.shutdown_poll(),
            max_shutdown_wait: config.max_shutdown_wait(),
        }
    }
}

impl Default for ProcessContextOptions {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_millis(100),
            shutdown_poll: Duration::from_millis(100),
            max_shutdown_wait: Duration::from_secs(10),
        }
    }
}

pub struct ProcessContextTeam {
    control: TeamControl,
    registry: ProcessRegistry,
    options: ProcessContextOptions,
}

/// Unregisters the thread's executor when `do_process` returns or unwinds.
struct Registration<'a> {
    team: &'a ProcessContextTeam,
    thread: ThreadId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let Some(executor) = self.team.registry.unregister_thread(self.thread) else {
            return;
        };
        // Routing happens under the registry lock, so nothing arrives after this.
        for job in executor.drain() {
            if thread::panicking() {
                self.team.control.abandon(job);
            } else {
                self.team.control.execute(job);
            }
        }
    }
}

impl ProcessContextTeam {
    pub fn new(name: impl Into<String>, options: ProcessContextOptions) -> Self {
        Self {
            control: TeamControl::new(name),
            registry: ProcessRegistry::default(),
            options,
        }
    }

    /// Run `body` on the current thread and then service jobs routed to
    /// this thread until the body's [`ProcessCompletion`] is signalled.
    ///
    /// Blocks the caller for the lifetime of the process. A thread may only
    /// be inside one `do_process` per team at a time.
    pub fn do_process<F>(&self, body: F) -> Result<(), TeamError>
    where
        F: FnOnce(ProcessCompletion),
    {
        if !self.control.is_working() {
            return Err(TeamError::ProcessContext(format!(
                "team {} is not working",
                self.control.name()
            )));
        }

        let thread = thread::current().id();
        let executor = Arc::new(JobQueueExecutor::new(thread));
        if !self.registry.register_thread(Arc::clone(&executor)) {
            return Err(TeamError::ProcessContext(format!(
                "thread {:?} is already running a process for team {}",
                thread,
                self.control.name()
            )));
        }
        let _registration = Registration { team: self, thread };
        debug!(team = %self.control.name(), ?thread, "process context entered");

        let completion = ProcessCompletion::new(Arc::clone(&executor));
        body(completion.clone());
        executor.run_until_complete(&self.control, &completion, self.options.wait_time);

        debug!(team = %self.control.name(), ?thread, "process context completed");
        Ok(())
    }

    /// Thread a process is currently bound to.
    pub fn thread_of(&self, process: &ProcessIdentifier) -> Option<ThreadId> {
        self.registry.thread_of(process)
    }

    pub fn bound_processes(&self) -> usize {
        self.registry.bound_processes()
    }
}

impl ProcessContextListener for ProcessContextTeam {
    fn process_created(&self, process: ProcessIdentifier) {
        let thread = thread::current().id();
        debug!(team = %self.control.name(), %process, ?thread, "process bound to thread");
        self.registry.bind(process, thread);
    }

    fn process_completed(&self, process: ProcessIdentifier) {
        if self.registry.unbind(&process).is_some() {
            debug!(team = %self.control.name(), %process, "process unbound");
        }
    }
}

impl Team for ProcessContextTeam {
    fn name(&self) -> &str {
        self.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.control.begin()
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        let Some(job) = self.control.accept(job) else {
            return;
        };

        let job = match job.process_identifier() {
            Some(process) => match self.registry.route(&process, job) {
                Ok(()) => return,
                Err(job) => job,
            },
            None => job,
        };

        self.control.record_passive_fallback();
        self.control.execute(job);
    }

    fn stop_working(&self) {
        if !self.control.request_stop() {
            return;
        }

        let deadline = deadline_after(self.options.max_shutdown_wait);
        loop {
            let pending = self.registry.pending_jobs();
            if pending == 0 {
                info!(team = %self.control.name(), "process context team stopped");
                return;
            }
            if expired(deadline) {
                warn!(
                    team = %self.control.name(),
                    pending,
                    waited = ?self.options.max_shutdown_wait,
                    "routed jobs still pending after shutdown wait"
                );
                self.control.record_shutdown_timeout();
                return;
            }
            thread::sleep(self.options.shutdown_poll);
        }
    }

    fn metrics(&self) -> TeamMetrics {
        self.control.metrics()
    }

    fn process_listener(&self) -> Option<&dyn ProcessContextListener> {
        Some(self)
    }
}

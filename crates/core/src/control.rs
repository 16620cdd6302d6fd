use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{JobError, TeamError};
use crate::job::{Job, JobContext};
use crate::metrics::TeamMetrics;

const IDLE: u8 = 0;
const WORKING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of a team. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamState {
    Idle,
    Working,
    Stopped,
}

/// Lifecycle flag, metrics, and guarded job execution shared by every team
/// implementation.
pub struct TeamControl {
    name: String,
    state: AtomicU8,
    metrics: Mutex<TeamMetrics>,
}

impl TeamControl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(IDLE),
            metrics: Mutex::new(TeamMetrics::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TeamState {
        match self.state.load(Ordering::SeqCst) {
            IDLE => TeamState::Idle,
            WORKING => TeamState::Working,
            _ => TeamState::Stopped,
        }
    }

    /// The "continue working" flag.
    pub fn is_working(&self) -> bool {
        self.state.load(Ordering::SeqCst) == WORKING
    }

    /// Transition `Idle -> Working`.
    pub fn begin(&self) -> Result<(), TeamError> {
        match self
            .state
            .compare_exchange(IDLE, WORKING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                info!(team = %self.name, "team started working");
                Ok(())
            }
            Err(WORKING) => Err(TeamError::AlreadyStarted(self.name.clone())),
            Err(_) => Err(TeamError::Stopped(self.name.clone())),
        }
    }

    /// Transition to `Stopped`. Returns `false` if the team was already
    /// stopped, so callers can make `stop_working` idempotent.
    pub fn request_stop(&self) -> bool {
        let previous = self.state.swap(STOPPED, Ordering::SeqCst);
        if previous == STOPPED {
            debug!(team = %self.name, "stop requested on already stopped team");
            return false;
        }
        info!(team = %self.name, "team stopping");
        true
    }

    pub fn context(&self) -> JobContext<'_> {
        JobContext::new(self)
    }

    /// Pass the job through if the team is working, otherwise cancel it.
    pub fn accept(&self, job: Box<dyn Job>) -> Option<Box<dyn Job>> {
        if self.is_working() {
            return Some(job);
        }
        self.metrics.lock().jobs_cancelled_not_working += 1;
        debug!(team = %self.name, job = %job.name(), "job assigned to team that is not working");
        job.cancel(JobError::NotWorking {
            team: self.name.clone(),
        });
        None
    }

    /// Run a job on the current thread.
    ///
    /// A panic escaping the job is caught and logged so the calling worker
    /// loop survives. Returns `false` if the job panicked.
    pub fn execute(&self, job: Box<dyn Job>) -> bool {
        let job_name = job.name().to_owned();
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(&self.context())));
        let elapsed = started.elapsed();

        let panicked = match outcome {
            Ok(()) => false,
            Err(payload) => {
                error!(
                    team = %self.name,
                    job = %job_name,
                    panic = %panic_message(payload.as_ref()),
                    "job panicked, worker continues"
                );
                true
            }
        };
        self.metrics.lock().record_execution(elapsed, panicked);
        !panicked
    }

    /// Cancel a job the team has no capacity for.
    pub fn reject(&self, job: Box<dyn Job>, reason: impl Into<String>) {
        let reason = reason.into();
        self.metrics.lock().jobs_rejected += 1;
        warn!(team = %self.name, job = %job.name(), reason = %reason, "job rejected");
        job.cancel(JobError::Rejected {
            team: self.name.clone(),
            reason,
        });
    }

    /// Cancel a job that shutdown will not wait for.
    pub fn abandon(&self, job: Box<dyn Job>) {
        self.metrics.lock().jobs_abandoned += 1;
        warn!(team = %self.name, job = %job.name(), "job abandoned during shutdown");
        job.cancel(JobError::Abandoned {
            team: self.name.clone(),
        });
    }

    pub fn record_passive_fallback(&self) {
        self.metrics.lock().passive_fallbacks += 1;
    }

    pub fn record_shutdown_timeout(&self) {
        self.metrics.lock().shutdown_timeouts += 1;
    }

    /// Snapshot of the team's metrics.
    pub fn metrics(&self) -> TeamMetrics {
        self.metrics.lock().clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FnJob;
    use std::sync::Arc;

    #[test]
    fn lifecycle_transitions() {
        let control = TeamControl::new("lifecycle");
        assert_eq!(control.state(), TeamState::Idle);
        assert!(!control.is_working());

        control.begin().unwrap();
        assert_eq!(control.state(), TeamState::Working);
        assert!(matches!(control.begin(), Err(TeamError::AlreadyStarted(_))));

        assert!(control.request_stop());
        assert_eq!(control.state(), TeamState::Stopped);
        assert!(!control.request_stop());
        assert!(matches!(control.begin(), Err(TeamError::Stopped(_))));
    }

    #[test]
    fn stop_from_idle_is_terminal() {
        let control = TeamControl::new("never-started");
        assert!(control.request_stop());
        assert!(control.begin().is_err());
    }

    #[test]
    fn accept_cancels_when_not_working() {
        let control = TeamControl::new("idle");
        let cancelled = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&cancelled);
        let job = FnJob::new(|_| panic!("must not run"))
            .on_cancel(move |cause| *sink.lock() = Some(cause))
            .boxed();

        assert!(control.accept(job).is_none());
        assert_eq!(
            *cancelled.lock(),
            Some(JobError::NotWorking { team: "idle".into() })
        );
        assert_eq!(control.metrics().jobs_cancelled_not_working, 1);
    }

    #[test]
    fn execute_survives_panicking_job() {
        let control = TeamControl::new("panics");
        control.begin().unwrap();

        assert!(!control.execute(FnJob::new(|_| panic!("boom")).boxed()));
        assert!(control.execute(FnJob::new(|_| {}).boxed()));

        let metrics = control.metrics();
        assert_eq!(metrics.jobs_executed, 2);
        assert_eq!(metrics.jobs_panicked, 1);
    }

    #[test]
    fn reject_and_abandon_reach_the_job() {
        let control = TeamControl::new("full");
        let causes = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&causes);
        control.reject(
            FnJob::new(|_| {}).on_cancel(move |c| sink.lock().push(c)).boxed(),
            "queue full",
        );
        let sink = Arc::clone(&causes);
        control.abandon(FnJob::new(|_| {}).on_cancel(move |c| sink.lock().push(c)).boxed());

        let causes = causes.lock();
        assert_eq!(
            causes[0],
            JobError::Rejected { team: "full".into(), reason: "queue full".into() }
        );
        assert_eq!(causes[1], JobError::Abandoned { team: "full".into() });
        let metrics = control.metrics();
        assert_eq!(metrics.jobs_rejected, 1);
        assert_eq!(metrics.jobs_abandoned, 1);
    }

    #[test]
    fn panic_message_extracts_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "non-string panic payload");
    }
}

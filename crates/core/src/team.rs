use crate::error::TeamError;
use crate::job::{Job, ProcessIdentifier};
use crate::metrics::TeamMetrics;

/// A pluggable strategy for running submitted jobs.
///
/// Lifecycle is `Idle -> Working -> Stopped`. `assign_job` never blocks the
/// caller beyond queue insertion, except for strategies that run jobs on the
/// calling thread. Failures to run a job are reported through the job's own
/// [`Job::cancel`], never through a return value here.
pub trait Team: Send + Sync {
    fn name(&self) -> &str;

    /// Begin accepting work.
    fn start_working(&self) -> Result<(), TeamError>;

    /// Submit a job for execution.
    fn assign_job(&self, job: Box<dyn Job>);

    /// Stop accepting work and wait, within the team's bound, for accepted
    /// jobs to finish. Safe to call more than once.
    fn stop_working(&self);

    fn metrics(&self) -> TeamMetrics;

    /// Teams that route by process identifier expose their listener here.
    fn process_listener(&self) -> Option<&dyn ProcessContextListener> {
        None
    }
}

/// Notifications from the surrounding container about logical processes.
pub trait ProcessContextListener: Send + Sync {
    /// Called on the thread that originated the process.
    fn process_created(&self, process: ProcessIdentifier);

    fn process_completed(&self, process: ProcessIdentifier);
}

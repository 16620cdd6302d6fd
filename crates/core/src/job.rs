use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::control::TeamControl;
use crate::error::JobError;

/// Opaque token grouping jobs that belong to one logical process.
///
/// Only affinity-aware teams look at it; everything else treats jobs as
/// independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentifier(Uuid);

impl ProcessIdentifier {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProcessIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProcessIdentifier {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProcessIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process-{}", self.0)
    }
}

/// View of the executing team handed to a running job.
pub struct JobContext<'a> {
    control: &'a TeamControl,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(control: &'a TeamControl) -> Self {
        Self { control }
    }

    /// Name of the team running the job.
    pub fn team_name(&self) -> &str {
        self.control.name()
    }

    /// Whether the team still wants work done.
    ///
    /// Long-running or retrying jobs consult this to stop early once the
    /// team has been asked to stop.
    pub fn continue_working(&self) -> bool {
        self.control.is_working()
    }
}

/// A unit of work submitted to a [`Team`](crate::Team).
///
/// Both entry points consume the job, so a job is either run or cancelled,
/// exactly once.
pub trait Job: Send {
    /// Execute the job on whatever thread the team chose.
    fn run(self: Box<Self>, context: &JobContext<'_>);

    /// Hand the job back unexecuted.
    fn cancel(self: Box<Self>, cause: JobError) {
        warn!(job = %self.name(), cause = %cause, "job cancelled");
    }

    /// Logical process the job belongs to, `None` when no affinity is needed.
    fn process_identifier(&self) -> Option<ProcessIdentifier> {
        None
    }

    /// Label used in logs and thread names.
    fn name(&self) -> &str {
        "job"
    }
}

type CancelHook = Box<dyn FnOnce(JobError) + Send>;

/// [`Job`] backed by a closure.
///
/// ```ignore
/// let job = FnJob::new(|ctx| println!("running on {}", ctx.team_name()))
///     .with_name("hello")
///     .on_cancel(|cause| eprintln!("not run: {cause}"));
/// team.assign_job(job.boxed());
/// ```
pub struct FnJob<F> {
    name: String,
    process: Option<ProcessIdentifier>,
    run: F,
    on_cancel: Option<CancelHook>,
}

impl<F> FnJob<F>
where
    F: FnOnce(&JobContext<'_>) + Send + 'static,
{
    pub fn new(run: F) -> Self {
        Self {
            name: "job".to_string(),
            process: None,
            run,
            on_cancel: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Tie the job to a logical process.
    pub fn with_process(mut self, process: ProcessIdentifier) -> Self {
        self.process = Some(process);
        self
    }

    /// Callback invoked instead of `run` when the team cancels the job.
    pub fn on_cancel(mut self, hook: impl FnOnce(JobError) + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    pub fn boxed(self) -> Box<dyn Job> {
        Box::new(self)
    }
}

impl<F> Job for FnJob<F>
where
    F: FnOnce(&JobContext<'_>) + Send + 'static,
{
    fn run(self: Box<Self>, context: &JobContext<'_>) {
        (self.run)(context)
    }

    fn cancel(self: Box<Self>, cause: JobError) {
        match self.on_cancel {
            Some(hook) => hook(cause),
            None => warn!(job = %self.name, cause = %cause, "job cancelled"),
        }
    }

    fn process_identifier(&self) -> Option<ProcessIdentifier> {
        self.process
    }

    fn name(&self) -> &str {
        &self.name
    }
}

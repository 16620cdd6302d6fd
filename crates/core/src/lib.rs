//! Core contracts for pluggable job-execution teams.
//!
//! A container obtains a [`Team`], calls `start_working`, submits opaque
//! [`Job`]s through `assign_job`, and eventually calls `stop_working`. This
//! crate holds what every strategy shares: the job contract, the lock-guarded
//! [`JobQueue`], the lifecycle block [`TeamControl`], metrics, configuration,
//! and errors. The strategies themselves live in `teamwork-teams`.

pub mod config;
pub mod control;
pub mod error;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod team;

pub use config::{load_dotenv, PoolKind, TeamConfig, TeamKind, TeamsConfig, ThreadPriority};
pub use control::{TeamControl, TeamState};
pub use error::{JobError, TeamError};
pub use job::{FnJob, Job, JobContext, ProcessIdentifier};
pub use metrics::TeamMetrics;
pub use queue::JobQueue;
pub use team::{ProcessContextListener, Team};

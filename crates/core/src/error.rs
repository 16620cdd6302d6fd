use thiserror::Error;

/// Errors surfaced by team construction and lifecycle calls.
///
/// Job-level failures never travel through this type; they are delivered to
/// the job itself as a [`JobError`] via [`Job::cancel`](crate::Job::cancel).
#[derive(Error, Debug)]
pub enum TeamError {
    #[error("invalid team configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("team '{0}' is already working")]
    AlreadyStarted(String),

    #[error("team '{0}' has been stopped")]
    Stopped(String),

    #[error("team '{team}' failed to spawn a worker thread: {reason}")]
    Spawn { team: String, reason: String },

    #[error("process context error: {0}")]
    ProcessContext(String),
}

/// Reasons a job was handed back through its cancellation channel instead of
/// being run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job rejected by team '{team}': {reason}")]
    Rejected { team: String, reason: String },

    #[error("team '{team}' is not working")]
    NotWorking { team: String },

    #[error("job abandoned by team '{team}' during shutdown")]
    Abandoned { team: String },
}

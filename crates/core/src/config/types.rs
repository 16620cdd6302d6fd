use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Top-level config ────────────────────────────────────────────────

/// Named team definitions, parsed from `teams.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamsConfig {
    #[serde(default)]
    pub teams: BTreeMap<String, TeamConfig>,
}

// ── Enums ───────────────────────────────────────────────────────────

/// Which scheduling strategy a team uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamKind {
    /// Run on the assigning thread.
    Passive,
    /// One dedicated worker thread.
    OnePerson,
    /// A new thread per job.
    WorkerPerJob,
    /// A new thread per job, named after the job.
    WorkerPerTask,
    /// Fixed or cached thread pool with bounded shutdown.
    Executor,
    /// Fixed pool using leader/follower hand-off.
    LeaderFollower,
    /// Propagates thread-local context into a delegate team.
    ThreadLocalAware,
    /// Routes jobs to the thread that originated their process.
    ProcessContext,
}

impl fmt::Display for TeamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamKind::Passive => "passive",
            TeamKind::OnePerson => "one_person",
            TeamKind::WorkerPerJob => "worker_per_job",
            TeamKind::WorkerPerTask => "worker_per_task",
            TeamKind::Executor => "executor",
            TeamKind::LeaderFollower => "leader_follower",
            TeamKind::ThreadLocalAware => "thread_local_aware",
            TeamKind::ProcessContext => "process_context",
        };
        write!(f, "{}", s)
    }
}

/// Requested priority for worker threads.
///
/// The standard library exposes no portable way to set thread priority, so
/// anything other than `Normal` is accepted and logged but has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPriority {
    Min,
    #[default]
    Normal,
    Max,
}

impl ThreadPriority {
    /// Log that a non-default priority cannot be applied.
    pub fn note_unsupported(&self, team: &str) {
        if *self != ThreadPriority::Normal {
            debug!(team = %team, priority = ?self, "thread priority not supported on this platform, ignoring");
        }
    }
}

impl FromStr for ThreadPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(ThreadPriority::Min),
            "normal" => Ok(ThreadPriority::Normal),
            "max" => Ok(ThreadPriority::Max),
            other => Err(format!("unknown thread priority '{other}'")),
        }
    }
}

/// Executor pool flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Exactly `max_size` threads for the pool's lifetime.
    #[default]
    Fixed,
    /// Grows from `min_size` to `max_size`, evicting idle threads.
    Cached,
}

// ── Per-team config ─────────────────────────────────────────────────

/// Properties of one team. Which ones are required depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub kind: TeamKind,

    /// Worker count for leader/follower teams.
    #[serde(default)]
    pub team_size: Option<usize>,

    /// Core threads kept by a cached executor.
    #[serde(default)]
    pub min_size: Option<usize>,

    /// Thread count of a fixed executor, ceiling of a cached one.
    #[serde(default)]
    pub max_size: Option<usize>,

    /// Executor queue bound. Unbounded when absent.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Idle time before a cached executor evicts a thread above `min_size`.
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,

    /// How long a worker blocks on its queue before re-checking state.
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,

    #[serde(default)]
    pub thread_priority: ThreadPriority,

    /// Upper bound on how long `stop_working` waits for in-flight jobs.
    #[serde(default = "default_max_shutdown_wait_seconds")]
    pub max_shutdown_wait_seconds: u64,

    /// Granularity of shutdown polling loops.
    #[serde(default = "default_shutdown_poll_ms")]
    pub shutdown_poll_ms: u64,

    #[serde(default)]
    pub pool: PoolKind,

    /// Name of the team a thread-local-aware team hands jobs to.
    #[serde(default)]
    pub delegate: Option<String>,
}

fn default_keep_alive_ms() -> u64 { 60_000 }
fn default_wait_time_ms() -> u64 { 100 }
fn default_max_shutdown_wait_seconds() -> u64 { 10 }
fn default_shutdown_poll_ms() -> u64 { 100 }

impl TeamConfig {
    /// Config of the given kind with every optional property at its default.
    pub fn new(kind: TeamKind) -> Self {
        Self {
            kind,
            team_size: None,
            min_size: None,
            max_size: None,
            queue_capacity: None,
            keep_alive_ms: default_keep_alive_ms(),
            wait_time_ms: default_wait_time_ms(),
            thread_priority: ThreadPriority::default(),
            max_shutdown_wait_seconds: default_max_shutdown_wait_seconds(),
            shutdown_poll_ms: default_shutdown_poll_ms(),
            pool: PoolKind::default(),
            delegate: None,
        }
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn max_shutdown_wait(&self) -> Duration {
        Duration::from_secs(self.max_shutdown_wait_seconds)
    }

    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }
}

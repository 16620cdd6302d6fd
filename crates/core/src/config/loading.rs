use std::env;
use std::path::Path;

use tracing::{info, warn};

use crate::error::TeamError;

use super::types::{TeamConfig, TeamsConfig, ThreadPriority};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse `{key}` from the environment, warning and ignoring unparsable values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key = %key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// Environment prefix for one team: `TEAMWORK_{NAME}_`, upper-cased with `-` as `_`.
fn env_prefix(team: &str) -> String {
    format!("TEAMWORK_{}_", team.to_uppercase().replace('-', "_"))
}

impl TeamsConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, TeamError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TeamError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn team(&self, name: &str) -> Option<&TeamConfig> {
        self.teams.get(name)
    }

    /// Print a one-line summary per team for startup logs.
    pub fn log_summary(&self) {
        info!("Teams config loaded ({} teams):", self.teams.len());
        for (name, team) in &self.teams {
            info!(
                "  {:<16} kind={} size={:?} max={:?} wait={}ms shutdown={}s",
                name,
                team.kind,
                team.team_size,
                team.max_size,
                team.wait_time_ms,
                team.max_shutdown_wait_seconds
            );
        }
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `TEAMWORK_{TEAM}_{KEY}` overrides `teams.{team}.{key}`.
    /// Examples:
    /// - `TEAMWORK_HTTP_TEAM_SIZE` -> `teams.http.team_size`
    /// - `TEAMWORK_IO_MAX_SIZE` -> `teams.io.max_size`
    /// - `TEAMWORK_IO_MAX_SHUTDOWN_WAIT_SECONDS` -> `teams.io.max_shutdown_wait_seconds`
    /// - `TEAMWORK_HTTP_THREAD_PRIORITY` -> `teams.http.thread_priority`
    pub(crate) fn apply_env_overrides(&mut self) {
        for (name, team) in self.teams.iter_mut() {
            team.apply_env_overrides(&env_prefix(name));
        }
    }
}

impl TeamConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        let key = |suffix: &str| format!("{prefix}{suffix}");

        if let Some(v) = env_parse::<usize>(&key("TEAM_SIZE")) {
            self.team_size = Some(v);
        }
        if let Some(v) = env_parse::<usize>(&key("MIN_SIZE")) {
            self.min_size = Some(v);
        }
        if let Some(v) = env_parse::<usize>(&key("MAX_SIZE")) {
            self.max_size = Some(v);
        }
        if let Some(v) = env_parse::<usize>(&key("QUEUE_CAPACITY")) {
            self.queue_capacity = Some(v);
        }
        if let Some(v) = env_parse::<u64>(&key("KEEP_ALIVE_MS")) {
            self.keep_alive_ms = v;
        }
        if let Some(v) = env_parse::<u64>(&key("WAIT_TIME_MS")) {
            self.wait_time_ms = v;
        }
        if let Some(v) = env_parse::<u64>(&key("MAX_SHUTDOWN_WAIT_SECONDS")) {
            self.max_shutdown_wait_seconds = v;
        }
        if let Some(v) = env_parse::<u64>(&key("SHUTDOWN_POLL_MS")) {
            self.shutdown_poll_ms = v;
        }
        if let Some(v) = env_parse::<ThreadPriority>(&key("THREAD_PRIORITY")) {
            self.thread_priority = v;
        }
    }
}

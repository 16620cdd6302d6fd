use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use teamwork_core::TeamError;

/// Spawn a named worker thread for `team`.
pub(crate) fn spawn_worker<F>(team: &str, thread_name: String, body: F) -> Result<JoinHandle<()>, TeamError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(thread_name)
        .spawn(body)
        .map_err(|e| TeamError::Spawn {
            team: team.to_string(),
            reason: e.to_string(),
        })
}

/// `wait` from now, or `None` when that instant is not representable.
pub(crate) fn deadline_after(wait: Duration) -> Option<Instant> {
    Instant::now().checked_add(wait)
}

/// Time left until `deadline`; unbounded without one.
pub(crate) fn remaining_until(deadline: Option<Instant>) -> Duration {
    deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()))
}

/// Whether `deadline` has passed.
pub(crate) fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

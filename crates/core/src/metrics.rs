use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Operational counters for one team.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamMetrics {
    /// Jobs that ran to completion (including those that panicked).
    pub jobs_executed: u64,
    /// Jobs whose execution panicked.
    pub jobs_panicked: u64,
    /// Jobs refused because the team was saturated.
    pub jobs_rejected: u64,
    /// Jobs still queued when shutdown gave up on them.
    pub jobs_abandoned: u64,
    /// Jobs assigned while the team was not working.
    pub jobs_cancelled_not_working: u64,
    /// Affinity-routed jobs that ran on the assigning thread instead.
    pub passive_fallbacks: u64,
    /// Shutdowns that hit their wait bound.
    pub shutdown_timeouts: u64,
    /// Mean job duration.
    pub avg_job_duration: Duration,
    /// When the most recent job finished.
    pub last_job_at: Option<DateTime<Utc>>,
}

impl TeamMetrics {
    /// Record a finished job.
    pub fn record_execution(&mut self, duration: Duration, panicked: bool) {
        self.jobs_executed += 1;
        if panicked {
            self.jobs_panicked += 1;
        }
        self.last_job_at = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = self.jobs_executed;
        self.avg_job_duration = if count == 1 {
            duration
        } else {
            let prev_nanos = self.avg_job_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    /// Total jobs handed back through their cancellation channel.
    pub fn jobs_cancelled(&self) -> u64 {
        self.jobs_rejected + self.jobs_abandoned + self.jobs_cancelled_not_working
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_single_execution() {
        let mut m = TeamMetrics::default();
        m.record_execution(Duration::from_millis(100), false);

        assert_eq!(m.jobs_executed, 1);
        assert_eq!(m.jobs_panicked, 0);
        assert!(m.last_job_at.is_some());
        assert_eq!(m.avg_job_duration, Duration::from_millis(100));
    }

    #[test]
    fn record_multiple_executions_averages() {
        let mut m = TeamMetrics::default();
        m.record_execution(Duration::from_millis(100), false);
        m.record_execution(Duration::from_millis(200), true);

        assert_eq!(m.jobs_executed, 2);
        assert_eq!(m.jobs_panicked, 1);
        let avg = m.avg_job_duration.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn cancelled_sums_every_cancellation_kind() {
        let m = TeamMetrics {
            jobs_rejected: 2,
            jobs_abandoned: 3,
            jobs_cancelled_not_working: 4,
            ..TeamMetrics::default()
        };
        assert_eq!(m.jobs_cancelled(), 9);
    }

    #[test]
    fn default_metrics() {
        let m = TeamMetrics::default();
        assert_eq!(m.jobs_executed, 0);
        assert_eq!(m.avg_job_duration, Duration::ZERO);
        assert!(m.last_job_at.is_none());
    }
}

use teamwork_core::{Job, Team, TeamControl, TeamError, TeamMetrics};

/// Runs every job synchronously on the thread that assigns it.
///
/// No pooling, no queueing: `assign_job` returns once the job has finished.
pub struct PassiveTeam {
    control: TeamControl,
}

impl PassiveTeam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            control: TeamControl::new(name),
        }
    }
}

impl Team for PassiveTeam {
    fn name(&self) -> &str {
        self.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.control.begin()
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        if let Some(job) = self.control.accept(job) {
            self.control.execute(job);
        }
    }

    fn stop_working(&self) {
        self.control.request_stop();
    }

    fn metrics(&self) -> TeamMetrics {
        self.control.metrics()
    }
}

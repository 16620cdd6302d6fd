use crate::error::TeamError;

use super::types::{PoolKind, TeamConfig, TeamKind, TeamsConfig};

impl TeamsConfig {
    /// Validate every team and the delegate references between them.
    pub fn validate(&self) -> Result<(), TeamError> {
        for (name, team) in &self.teams {
            team.validate(name)?;
            self.validate_delegate(name, team)?;
        }
        Ok(())
    }

    /// A delegate must name another configured team that is not itself a wrapper.
    fn validate_delegate(&self, name: &str, team: &TeamConfig) -> Result<(), TeamError> {
        let Some(delegate) = team.delegate.as_deref() else {
            return Ok(());
        };
        if delegate == name {
            return Err(TeamError::Config(format!("team '{name}' cannot delegate to itself")));
        }
        match self.teams.get(delegate) {
            None => Err(TeamError::Config(format!(
                "team '{name}' references unknown delegate team '{delegate}'"
            ))),
            Some(target) if target.kind == TeamKind::ThreadLocalAware => Err(TeamError::Config(format!(
                "team '{name}' delegates to '{delegate}', which is itself thread_local_aware"
            ))),
            Some(_) => Ok(()),
        }
    }
}

impl TeamConfig {
    /// Check the properties this team's kind depends on.
    pub fn validate(&self, name: &str) -> Result<(), TeamError> {
        if self.wait_time_ms == 0 {
            return Err(TeamError::Config(format!("team '{name}': wait_time_ms must be positive")));
        }
        if self.shutdown_poll_ms == 0 {
            return Err(TeamError::Config(format!("team '{name}': shutdown_poll_ms must be positive")));
        }

        match self.kind {
            TeamKind::LeaderFollower => {
                Self::require(name, "team_size", self.team_size)?;
            }
            TeamKind::Executor => {
                let max = Self::require(name, "max_size", self.max_size)?;
                if self.pool == PoolKind::Cached {
                    let min = self.min_size.unwrap_or(0);
                    if min > max {
                        return Err(TeamError::Config(format!(
                            "team '{name}': min_size ({min}) exceeds max_size ({max})"
                        )));
                    }
                }
            }
            TeamKind::ThreadLocalAware => {
                if self.delegate.is_none() {
                    return Err(TeamError::Config(format!(
                        "team '{name}': missing required property 'delegate'"
                    )));
                }
            }
            TeamKind::Passive
            | TeamKind::OnePerson
            | TeamKind::WorkerPerJob
            | TeamKind::WorkerPerTask
            | TeamKind::ProcessContext => {}
        }
        Ok(())
    }

    /// Fetch a required, positive size property.
    pub fn require(team: &str, key: &str, value: Option<usize>) -> Result<usize, TeamError> {
        match value {
            None => Err(TeamError::Config(format!(
                "team '{team}': missing required property '{key}'"
            ))),
            Some(0) => Err(TeamError::Config(format!("team '{team}': {key} must be at least 1"))),
            Some(v) => Ok(v),
        }
    }
}

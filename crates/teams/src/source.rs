//! Builds teams from [`TeamsConfig`] entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use teamwork_core::{PoolKind, Team, TeamConfig, TeamError, TeamKind, TeamsConfig};

use crate::executor::{ExecutorOptions, ExecutorTeam, PoolSpec};
use crate::leader_follower::{LeaderFollowerOptions, LeaderFollowerTeam};
use crate::one_person::{OnePersonOptions, OnePersonTeam};
use crate::passive::PassiveTeam;
use crate::process_context::{ProcessContextOptions, ProcessContextTeam};
use crate::thread_local::{ContextPropagator, ThreadLocalAwareTeam};
use crate::worker_per_job::{WorkerPerJobTeam, WorkerPerTaskTeam};

/// Factory turning named configuration into running-ready teams.
#[derive(Default)]
pub struct TeamSource {
    propagators: Vec<Arc<dyn ContextPropagator>>,
}

impl TeamSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread-local values every `thread_local_aware` team carries to its workers.
    pub fn with_propagator(mut self, propagator: Arc<dyn ContextPropagator>) -> Self {
        self.propagators.push(propagator);
        self
    }

    /// Build one team. `all` resolves delegate references.
    pub fn create_team(
        &self,
        name: &str,
        config: &TeamConfig,
        all: &TeamsConfig,
    ) -> Result<Arc<dyn Team>, TeamError> {
        config.validate(name)?;

        let team: Arc<dyn Team> = match config.kind {
            TeamKind::Passive => Arc::new(PassiveTeam::new(name)),
            TeamKind::OnePerson => Arc::new(OnePersonTeam::new(
                name,
                OnePersonOptions {
                    wait_time: config.wait_time(),
                    thread_priority: config.thread_priority,
                    poll_interval: config.shutdown_poll(),
                },
            )),
            TeamKind::WorkerPerJob => Arc::new(WorkerPerJobTeam::new(name, config.thread_priority)),
            TeamKind::WorkerPerTask => {
                Arc::new(WorkerPerTaskTeam::new(name, config.thread_priority))
            }
            TeamKind::Executor => {
                let max_size = TeamConfig::require(name, "max_size", config.max_size)?;
                let pool = match config.pool {
                    PoolKind::Fixed => PoolSpec::Fixed {
                        size: max_size,
                        queue_capacity: config.queue_capacity,
                    },
                    PoolKind::Cached => PoolSpec::Cached {
                        min_size: config.min_size.unwrap_or(0),
                        max_size,
                        keep_alive: config.keep_alive(),
                        queue_capacity: config.queue_capacity,
                    },
                };
                Arc::new(ExecutorTeam::new(
                    name,
                    ExecutorOptions {
                        pool,
                        max_shutdown_wait: config.max_shutdown_wait(),
                        thread_priority: config.thread_priority,
                    },
                ))
            }
            TeamKind::LeaderFollower => {
                let team_size = TeamConfig::require(name, "team_size", config.team_size)?;
                Arc::new(LeaderFollowerTeam::new(
                    name,
                    LeaderFollowerOptions {
                        team_size,
                        wait_time: config.wait_time(),
                        thread_priority: config.thread_priority,
                    },
                ))
            }
            TeamKind::ThreadLocalAware => {
                let delegate = self.create_delegate(name, config, all)?;
                Arc::new(ThreadLocalAwareTeam::new(name, delegate, self.propagators.clone()))
            }
            TeamKind::ProcessContext => Arc::new(ProcessContextTeam::new(
                name,
                ProcessContextOptions::from_config(config),
            )),
        };

        info!(team = %name, kind = %config.kind, "team created");
        Ok(team)
    }

    /// Build every configured team, keyed by name.
    pub fn create_all(
        &self,
        config: &TeamsConfig,
    ) -> Result<BTreeMap<String, Arc<dyn Team>>, TeamError> {
        config.validate()?;
        config
            .teams
            .iter()
            .map(|(name, team)| Ok((name.clone(), self.create_team(name, team, config)?)))
            .collect()
    }

    /// A fresh instance of the delegate, private to the wrapping team.
    fn create_delegate(
        &self,
        name: &str,
        config: &TeamConfig,
        all: &TeamsConfig,
    ) -> Result<Arc<dyn Team>, TeamError> {
        let delegate = config.delegate.as_deref().ok_or_else(|| {
            TeamError::Config(format!("team '{name}': missing required property 'delegate'"))
        })?;
        let target = all.team(delegate).ok_or_else(|| {
            TeamError::Config(format!(
                "team '{name}' references unknown delegate team '{delegate}'"
            ))
        })?;
        if target.kind == TeamKind::ThreadLocalAware {
            return Err(TeamError::Config(format!(
                "team '{name}' delegates to '{delegate}', which is itself thread_local_aware"
            )));
        }
        self.create_team(&format!("{name}/{delegate}"), target, all)
    }
}

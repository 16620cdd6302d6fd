//! Team strategies.
//!
//! Every strategy implements [`teamwork_core::Team`]; [`TeamSource`] builds
//! them from configuration.

pub mod executor;
pub mod leader_follower;
pub mod one_person;
pub mod passive;
pub mod process_context;
pub mod source;
pub mod thread_local;
mod worker;
pub mod worker_per_job;

pub use executor::{ElasticExecutor, Executor, ExecutorOptions, ExecutorTeam, FixedExecutor, PoolSpec, Rejected};
pub use leader_follower::{LeaderFollowerOptions, LeaderFollowerTeam, Occupancy, TeamMemberStack};
pub use one_person::{OnePersonOptions, OnePersonTeam};
pub use passive::PassiveTeam;
pub use process_context::{ProcessCompletion, ProcessContextOptions, ProcessContextTeam};
pub use source::TeamSource;
pub use thread_local::{CapturedContext, ContextPropagator, ThreadLocalAwareTeam, ThreadLocalPropagator};
pub use worker_per_job::{WorkerPerJobTeam, WorkerPerTaskTeam};

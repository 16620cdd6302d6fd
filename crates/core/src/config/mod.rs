//! Team configuration, typically parsed from TOML.
//!
//! Split into focused submodules:
//! - `types`: serde structs and enums with their defaults
//! - `loading`: TOML/file parsing, `.env` loading, and environment overrides
//! - `validation`: per-kind required properties and delegate references

mod loading;
mod types;
mod validation;

pub use loading::load_dotenv;
pub use types::{PoolKind, TeamConfig, TeamKind, TeamsConfig, ThreadPriority};

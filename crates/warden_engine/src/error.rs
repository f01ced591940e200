//! # Engine Error Types
//!
//! Only the outer surfaces can fail. The numeric hot path suppresses
//! degenerate samples locally and never returns an error.

use thiserror::Error;

use crate::entity::EntityKey;

/// Errors raised while parsing or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid TOML or does not match the schema.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A value is outside its accepted range.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors surfaced by the engine facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Work was submitted after shutdown.
    #[error("scheduler is shut down")]
    SchedulerShutdown,

    /// No state is registered for this entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityKey),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the session pool and its configuration providers.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool has not been initialized")]
    NotInitialized,

    #[error("Missing configuration key: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("No free session within {0:?}")]
    AcquireTimeout(Duration),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Session error: {0}")]
    SessionClosed(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;

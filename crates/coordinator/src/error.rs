//! Coordinator error types

use glucolink_core::StoreError;
use thiserror::Error;

/// Errors surfaced to coordinator callers.
///
/// Telemetry, dispatch and persistence failures during operation are logged
/// and never end up here.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Persisted settings could not be loaded at startup
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The coordinator task has stopped
    #[error("coordinator is not running")]
    Closed,
}

/// Result alias for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

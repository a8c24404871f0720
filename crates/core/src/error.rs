//! Core error types

use thiserror::Error;

/// Errors raised by a [`crate::store::ConfigurationStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Settings could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),
}

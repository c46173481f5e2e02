//! Error types for the registry client layer.

use thiserror::Error;

use crate::names::NameError;

/// Errors surfaced by registry providers and the bounded adapter.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The named resource does not exist. Callers that treat absence as a
    /// normal state (the planner, the staleness oracle) must check
    /// [`RegistryError::is_not_found`] instead of failing.
    #[error("resource not found: {name}")]
    NotFound { name: String },

    /// Transport-level failure talking to the registry service.
    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error(transparent)]
    Name(#[from] NameError),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot decode error: {0}")]
    Snapshot(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Transport { retryable: true, .. })
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

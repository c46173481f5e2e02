//! Controller-level error taxonomy.
//!
//! Name parse failures and provider errors pass through transparently;
//! everything else maps onto one of the variants below. The planner
//! collects per-entry errors and keeps going; the applier aborts on the
//! first error; scoring returns the first error of the dispatched formula.

use thiserror::Error;

use apihub_registry::{NameError, RegistryError};

/// Errors produced by the controller engines.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A `$resource.<entity>` reference that cannot be resolved against
    /// the bound reference resource.
    #[error("unbound reference in {pattern:?}: not resolvable against {reference}")]
    UnboundReference { pattern: String, reference: String },

    #[error("invalid manifest entry: {0}")]
    Validation(String),

    #[error("invalid score definition: {0}")]
    InvalidDefinition(String),

    #[error("expression error: {0}")]
    Expression(String),

    #[error("failed to fetch {name}: {source}")]
    Fetch {
        name: String,
        #[source]
        source: RegistryError,
    },

    #[error("failed to decode payload of {name}: {reason}")]
    Payload { name: String, reason: String },

    #[error("document error: {0}")]
    Document(String),

    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type for controller operations.
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;

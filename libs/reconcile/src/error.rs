//! Error types for failover reconciliation.

use thiserror::Error;

use crate::model::ResourceKind;

/// Failure of a call to the cloud provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request could not be sent or no response arrived.
    #[error("{operation} request failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    /// The provider answered with a non-success status.
    #[error("{operation} returned status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("{operation} returned an undecodable response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// Pagination did not terminate within the configured page guard.
    #[error("{operation} did not finish within {max_pages} pages")]
    PageLimitExceeded {
        operation: &'static str,
        max_pages: usize,
    },
}

impl ProviderError {
    /// The provider operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Request { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. }
            | Self::PageLimitExceeded { operation, .. } => operation,
        }
    }
}

/// Invalid caller input or group tagging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The caller supplied a pagination cursor; the catalog owns the cursor.
    #[error("pagination cursor must not be supplied by the caller")]
    CallerSuppliedCursor,

    /// A recognized tag key appears more than once on a group.
    #[error("group {group} carries tag {key} {count} times")]
    DuplicateTag {
        group: String,
        key: String,
        count: usize,
    },

    /// A group names itself as its own failover target.
    #[error("group {group} names itself as failover target")]
    SelfFailover { group: String },

    /// Two pairs manage the same resource.
    #[error("{kind} {resource_id} is claimed by both {first} and {second}")]
    DuplicateResourceClaim {
        kind: ResourceKind,
        resource_id: String,
        first: String,
        second: String,
    },
}

/// Errors that abort a reconciliation run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

//! Error types for the flow repository
//!
//! Each collaborator has its own error enum; [`RepoError`] is the taxonomy
//! surfaced to callers of the repository. Conversions keep the most specific
//! member available and never drop the underlying message.

use crate::permissions::Capability;
use crate::types::FlowId;

/// Document store failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No document with this identifier
    #[error("flow not found: {0}")]
    NotFound(FlowId),

    /// Identifier already taken
    #[error("flow already exists: {0}")]
    Conflict(FlowId),

    /// Filter could not be evaluated
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Backend unreachable or failing
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Permission authority failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    /// Transport or network failure
    #[error("permission authority unavailable: {0}")]
    Unavailable(String),

    /// Authority refused the request as malformed
    #[error("permission authority rejected request: {0}")]
    Rejected(String),
}

/// Operator catalog failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Catalog has no such operator
    #[error("operator not found: {0}")]
    NotFound(String),

    /// Transport or unexpected status
    #[error("operator catalog request failed: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("operator catalog response invalid: {0}")]
    Decode(String),
}

/// Errors returned by repository operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    /// No such flow
    #[error("flow not found: {0}")]
    NotFound(FlowId),

    /// Capability check returned false
    #[error("missing {capability} rights on {resource}")]
    PermissionDenied {
        capability: Capability,
        resource: FlowId,
    },

    /// Permission authority unreachable
    #[error(transparent)]
    AuthorityUnavailable(AuthorityError),

    /// Permission authority refused a write
    #[error(transparent)]
    AuthorityRejected(AuthorityError),

    /// Document store unreachable
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store identifier collision
    #[error("store conflict on {0}")]
    StoreConflict(FlowId),

    /// Catalog lookup failed during create or update
    #[error("enrichment of operator {operator} failed: {reason}")]
    EnrichmentFailed { operator: String, reason: String },

    /// Malformed list arguments
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl RepoError {
    /// Whether the caller, not the infrastructure, is at fault
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::PermissionDenied { .. } | Self::InvalidQuery(_)
        )
    }

    /// Denial of `capability` on `resource`
    #[inline]
    #[must_use]
    pub fn denied(capability: Capability, resource: &FlowId) -> Self {
        Self::PermissionDenied {
            capability,
            resource: resource.clone(),
        }
    }

    /// Enrichment failure for `operator`
    #[inline]
    pub fn enrichment(operator: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::EnrichmentFailed {
            operator: operator.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(id) => Self::StoreConflict(id),
            StoreError::InvalidQuery(msg) => Self::InvalidQuery(msg),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl From<AuthorityError> for RepoError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Unavailable(_) => Self::AuthorityUnavailable(err),
            AuthorityError::Rejected(_) => Self::AuthorityRejected(err),
        }
    }
}

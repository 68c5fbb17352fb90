//! Domain errors for the multiverse search system.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by external collaborators (generation, simulation, scoring, embedding).
///
/// Only [`ServiceError::Transient`] and [`ServiceError::Timeout`] are retried, and only
/// inside the adapters. The worker loop sees final outcomes.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Rate limiting, 5xx responses, dropped connections.
    #[error("Transient service failure: {0}")]
    Transient(String),

    /// Content flagged by moderation. Never retried.
    #[error("Content policy violation: {0}")]
    PolicyViolation(String),

    /// The collaborator answered, but not in the agreed shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Service call failed: {0}")]
    Failed(String),
}

impl ServiceError {
    /// Returns true if the error may succeed when retried.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// Returns true for moderation failures, which must surface to the worker untouched.
    pub const fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation(_))
    }
}

/// Domain-level errors that can occur in the multiverse system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Node not found: {0}")]
    NodeNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Lineage of node {0} is broken: {1}")]
    BrokenLineage(Uuid, String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type DomainResult<T> = Result<T, DomainError>;

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ServiceError::Transient("429".into()).is_transient());
        assert!(ServiceError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ServiceError::PolicyViolation("flagged".into()).is_transient());
        assert!(!ServiceError::MalformedResponse("bad json".into()).is_transient());
        assert!(!ServiceError::Failed("boom".into()).is_transient());
    }

    #[test]
    fn test_service_error_converts_to_domain_error() {
        let err: DomainError = ServiceError::PolicyViolation("flagged".into()).into();
        assert!(matches!(err, DomainError::Service(ServiceError::PolicyViolation(_))));
        assert_eq!(err.to_string(), "Content policy violation: flagged");
    }
}

//! Error types for the publishing core

use thiserror::Error;
use uuid::Uuid;

use crate::validate::ValidationResult;

/// Result type for publishing operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Publishing errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Snapshot failed validation with {} error(s)", .0.errors.len())]
    Validation(ValidationResult),

    #[error("Version {label} already exists for project {project_id}")]
    Conflict { project_id: Uuid, label: String },

    #[error("Version {requested} is not newer than the latest published version {latest}")]
    VersionNotNewer { requested: String, latest: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Checksum mismatch for version {label}: expected {expected}, got {actual}")]
    Integrity {
        label: String,
        expected: String,
        actual: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    /// Create a not-found error for an entity id
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PublishError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a request-shape error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        PublishError::InvalidRequest(msg.into())
    }

    /// Category of this error, for mapping onto an outer protocol
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::NotFound { .. } => ErrorKind::NotFound,
            PublishError::Validation(_) => ErrorKind::Validation,
            PublishError::Conflict { .. } | PublishError::VersionNotNewer { .. } => {
                ErrorKind::Conflict
            }
            PublishError::InvalidRequest(_) | PublishError::InvalidVersion(_) => {
                ErrorKind::InvalidRequest
            }
            PublishError::Integrity { .. } | PublishError::Store(_) | PublishError::Json(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    /// HTTP status equivalent of this category
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 422,
            ErrorKind::Conflict => 409,
            ErrorKind::InvalidRequest => 400,
            ErrorKind::Internal => 500,
        }
    }
}

/// Storage-layer errors, propagated without interpretation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: &'static str },

    #[error("Foreign key violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Version {label} does not sort after {latest}")]
    OrderViolation { label: String, latest: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this is a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PublishError::not_found("project", "abc");
        assert_eq!(err.to_string(), "project not found: abc");
    }

    #[test]
    fn test_error_kinds() {
        let pairs = vec![
            (PublishError::not_found("project", "x"), 404),
            (PublishError::invalid_request("x"), 400),
            (PublishError::InvalidVersion("x".into()), 400),
            (
                PublishError::Conflict {
                    project_id: Uuid::nil(),
                    label: "1.0".into(),
                },
                409,
            ),
            (
                PublishError::VersionNotNewer {
                    requested: "0.9".into(),
                    latest: "1.0".into(),
                },
                409,
            ),
            (PublishError::Validation(ValidationResult::default()), 422),
            (
                PublishError::Store(StoreError::Unavailable("down".into())),
                500,
            ),
        ];

        for (err, status) in pairs {
            assert_eq!(err.kind().http_status(), status, "{}", err);
        }
    }

    #[test]
    fn test_store_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StoreError = io_err.into();
        assert!(err.to_string().contains("IO error"));
        assert!(!err.is_unique_violation());

        let err: PublishError = err.into();
        assert!(matches!(err, PublishError::Store(StoreError::Io(_))));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

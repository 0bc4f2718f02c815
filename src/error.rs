//! Custom error types for Ledgerbook
//!
//! This module defines the error hierarchy for the crate using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Ledgerbook operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for request parameters and records
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed history queries
    #[error("Query error: {0}")]
    Query(String),
}

impl LedgerError {
    /// Create a "not found" error for audit entries
    pub fn audit_entry_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Audit entry",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Query(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("Blocking storage task failed: {}", err))
    }
}

/// Result type alias for Ledgerbook operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = LedgerError::audit_entry_not_found("3f2a");
        assert_eq!(err.to_string(), "Audit entry not found: 3f2a");
        assert!(err.is_not_found());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_query_error_is_client_error() {
        let err = LedgerError::Query("bad startDate".into());
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Query error: bad startDate");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LedgerError = io_err.into();
        assert!(matches!(err, LedgerError::Io(_)));
    }

    #[tokio::test]
    async fn test_from_join_error() {
        let join_err = tokio::task::spawn_blocking(|| panic!("disk on fire"))
            .await
            .unwrap_err();
        let err: LedgerError = join_err.into();
        assert!(matches!(err, LedgerError::Storage(_)));
    }
}

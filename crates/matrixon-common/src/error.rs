//! Error types for Matrixon Timeline
//!
//! Duplicate insertions, cyclic chunk links and undetermined recency are
//! not errors and never show up here. These variants cover the failures a
//! caller has to react to, usually by abandoning the enclosing transaction.

use thiserror::Error;

/// Matrixon error types
#[derive(Debug, Error)]
pub enum MatrixonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored data could not be read back or the store refused a write
    #[error("Database error: {0}")]
    Database(String),

    /// An event that cannot be placed in a timeline
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Malformed Matrix identifier
    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] ruma::IdParseError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for Matrixon operations
pub type Result<T> = std::result::Result<T, MatrixonError>;

impl MatrixonError {
    /// Corrupt or inconsistent record found in the store.
    pub fn bad_database(message: &'static str) -> Self {
        MatrixonError::Database(message.to_owned())
    }
}

impl From<serde_json::Error> for MatrixonError {
    fn from(err: serde_json::Error) -> Self {
        MatrixonError::Serialization(err.to_string())
    }
}

impl From<figment::Error> for MatrixonError {
    fn from(err: figment::Error) -> Self {
        MatrixonError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_error_display() {
        let err = MatrixonError::Config("test".to_string());
        assert_eq!(err.to_string(), "Configuration error: test");

        let err = MatrixonError::InvalidEvent("test".to_string());
        assert_eq!(err.to_string(), "Invalid event: test");

        let err = MatrixonError::bad_database("Invalid chunk in db.");
        assert_eq!(err.to_string(), "Database error: Invalid chunk in db.");

        let err = MatrixonError::NotFound("test".to_string());
        assert_eq!(err.to_string(), "Resource not found: test");
    }

    #[test]
    fn test_error_conversion_from_id_parse() {
        let parse_err = ruma::EventId::parse("").unwrap_err();
        let err: MatrixonError = parse_err.into();
        assert!(err.to_string().starts_with("Invalid identifier"));
    }

    #[test]
    fn test_error_conversion_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: MatrixonError = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}

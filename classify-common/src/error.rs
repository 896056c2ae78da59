//! Common error types for classify

use thiserror::Error;

/// Common result type for classify operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by collections, imports and the orchestrator
///
/// Management operations surface these variants verbatim to callers.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown collection, import, provider, type or fingerprint
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique key (collection name, registered type)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Operation not allowed in the current state (disabled buffer,
    /// double start, double stop)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed or unauthorized input configuration
    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    /// A dependency's configuration pass failed, the parent datum was aborted
    #[error("Dependency '{datum}' failed: {source}")]
    DependencyFailure {
        /// Name of the dependency whose configuration failed
        datum: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (task join failures and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a dependency failure so the parent datum reports which child failed
    pub fn dependency(datum: impl Into<String>, source: Error) -> Self {
        Error::DependencyFailure {
            datum: datum.into(),
            source: Box::new(source),
        }
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for `InvalidState`
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_failure_message_names_child() {
        let err = Error::dependency(
            "cover.jpg",
            Error::ValidationFailure("attachment too large".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("cover.jpg"));
        assert!(msg.contains("attachment too large"));
    }

    #[test]
    fn test_kind_helpers() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::InvalidState("x".into()).is_invalid_state());
        assert!(!Error::AlreadyExists("x".into()).is_not_found());
    }
}

use thiserror::Error;

/// Core error type for the Netsite topology engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Missing or malformed node/edge, or a dangling endpoint reference.
    /// Raised before any mutation happens.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage or transaction failure. Everything written inside the
    /// failed operation has been rolled back and the call can be retried.
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// The site the operation refers to does not exist
    #[error("Site not found: {0}")]
    SiteNotFound(String),

    /// The caller was not cleared to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StateStoreError(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "state_postgres")]
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::StateStoreError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

//! Error types for lifeline-core.

use thiserror::Error;

use crate::config::ConfigValidationError;

/// Result type alias using lifeline-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session lifecycle operations
#[derive(Error, Debug)]
pub enum Error {
    // Argument errors
    #[error("invalid {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    // Persistence errors
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("Session store lock poisoned")]
    LockPoisoned,

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Check if this error is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

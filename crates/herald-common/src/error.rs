//! Error types for Herald

use thiserror::Error;

/// Main error type for Herald
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate event key: {0}")]
    DuplicateEventKey(String),

    #[error("Cannot uninstall built-in mailer: {0}")]
    CannotUninstallBuiltin(String),

    #[error("Render error in field '{field}': {message}")]
    Render { field: String, message: String },

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Herald
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::DuplicateEventKey(_) => "DUPLICATE_EVENT_KEY",
            Error::CannotUninstallBuiltin(_) => "CANNOT_UNINSTALL_BUILTIN",
            Error::Render { .. } => "RENDER_ERROR",
            Error::Delivery(_) => "DELIVERY_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::NotSupported(_) => "NOT_SUPPORTED",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Shorthand for a render failure on a named content field
    pub fn render(field: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Error::Render {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

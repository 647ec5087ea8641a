//! Common error types shared across crates

use thiserror::Error;

/// Common result type
pub type Result<T> = std::result::Result<T, CommonError>;

/// Common errors that can occur across firewall crates
#[derive(Error, Debug)]
pub enum CommonError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Container runtime error
    #[error("Container runtime error: {0}")]
    ContainerRuntime(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

//! Driver-specific error types and conversions
//!
//! This module provides error types for storage driver operations, separating
//! configuration problems (fatal at startup) from I/O failures (retryable by
//! the caller) and missing objects (not retryable).

use thiserror::Error;

/// Result type alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Storage driver errors
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// Bad driver settings, surfaced when the driver is built
    #[error("Driver configuration error: {0}")]
    Configuration(String),

    /// Transient network or filesystem failure
    #[error("Driver I/O error: {0}")]
    Io(String),

    /// Credentials were rejected by the backend
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Object or prefix does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A fetch attempt exceeded its time budget
    #[error("Timed out after {seconds:.1}s: {operation}")]
    Timeout { operation: String, seconds: f64 },

    /// Domain error from core crate
    #[error("Domain error: {0}")]
    Domain(#[from] model_assets_core::AssetsError),
}

impl DriverError {
    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }

    /// Check if the backend rejected the credentials
    pub fn is_authentication(&self) -> bool {
        matches!(self, DriverError::Authentication(_))
    }

    /// Check if this is a transient error that could be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::Io(_) | DriverError::Authentication(_) | DriverError::Timeout { .. }
        )
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DriverError::NotFound(err.to_string()),
            _ => DriverError::Io(err.to_string()),
        }
    }
}

impl From<object_store::Error> for DriverError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => DriverError::NotFound(path),
            object_store::Error::Unauthenticated { .. }
            | object_store::Error::PermissionDenied { .. } => {
                DriverError::Authentication(err.to_string())
            }
            object_store::Error::InvalidPath { .. } => DriverError::Configuration(err.to_string()),
            // List requests report rejected credentials only through the
            // status of the underlying client error
            object_store::Error::Generic { .. } if rejects_credentials(&err) => {
                DriverError::Authentication(err.to_string())
            }
            other => DriverError::Io(other.to_string()),
        }
    }
}

/// Whether a 401 or 403 response appears anywhere in the error chain
fn rejects_credentials(err: &(dyn std::error::Error + 'static)) -> bool {
    const REJECTED: [&str; 4] = ["status 401", "status 403", "(401 ", "(403 "];

    let mut current = Some(err);
    while let Some(e) = current {
        let message = e.to_string();
        if REJECTED.iter().any(|status| message.contains(status)) {
            return true;
        }
        current = e.source();
    }
    false
}

//! Service-layer error types
//!
//! This module defines the errors reported by the assets manager and the
//! batch resolver, mapping core and driver errors to service-level errors.
//! Every variant is cheap to clone so that all callers waiting on one fetch
//! observe the same failure.

use model_assets_core::AssetsError;
use model_assets_drivers::DriverError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// One model that failed during batch resolution
#[derive(Debug, Clone)]
pub struct ModelFailure {
    pub model: String,
    pub error: ServiceError,
}

/// Service-layer error types
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Malformed asset specifier
    #[error("Invalid specifier: {0}")]
    InvalidSpecifier(String),

    /// Bad backend or manager settings
    #[error("Driver configuration error: {0}")]
    DriverConfiguration(String),

    /// Transient I/O or authentication failure, retryable by the caller
    #[error("Driver I/O error: {0}")]
    DriverIo(String),

    /// Asset, version or object does not exist
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// A "latest" version was requested without a remote store
    #[error("Cannot resolve version: {0}")]
    VersionResolution(String),

    /// The model declares no asset to resolve
    #[error("Asset configuration error: {0}")]
    AssetConfiguration(String),

    /// Batch resolution failed for some models
    #[error("Failed to resolve assets for {} model(s): {}", .0.len(), format_failures(.0))]
    BatchFailed(Vec<ModelFailure>),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_failures(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.model, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ServiceError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::DriverIo(_))
    }

    /// Names of the failed models of a batch error
    pub fn failed_models(&self) -> Vec<&str> {
        match self {
            ServiceError::BatchFailed(failures) => {
                failures.iter().map(|f| f.model.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<AssetsError> for ServiceError {
    fn from(err: AssetsError) -> Self {
        match err {
            AssetsError::InvalidSpecifier { .. } | AssetsError::InvalidVersion(_) => {
                ServiceError::InvalidSpecifier(err.to_string())
            }
            AssetsError::InvalidSettings(msg) => ServiceError::DriverConfiguration(msg),
            AssetsError::InvalidUri { .. } => ServiceError::InvalidSpecifier(err.to_string()),
        }
    }
}

impl From<DriverError> for ServiceError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Configuration(msg) => ServiceError::DriverConfiguration(msg),
            DriverError::NotFound(msg) => ServiceError::AssetNotFound(msg),
            DriverError::Io(msg) => ServiceError::DriverIo(msg),
            DriverError::Authentication(msg) => {
                ServiceError::DriverIo(format!("credentials rejected: {}", msg))
            }
            DriverError::Timeout { .. } => ServiceError::DriverIo(err.to_string()),
            DriverError::Domain(err) => ServiceError::from(err),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::DriverIo(format!("local cache: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_from_driver_error() {
        let err: ServiceError = DriverError::NotFound("p/m/1.0".to_string()).into();
        assert!(matches!(err, ServiceError::AssetNotFound(_)));

        let err: ServiceError = DriverError::Authentication("expired".to_string()).into();
        assert!(err.is_retryable());

        let err: ServiceError = DriverError::Configuration("no bucket".to_string()).into();
        assert!(matches!(err, ServiceError::DriverConfiguration(_)));
    }

    #[test]
    fn test_driver_io_message_is_not_repeated() {
        let err: ServiceError = DriverError::Io("connection reset by peer".to_string()).into();
        assert_eq!(err.to_string(), "Driver I/O error: connection reset by peer");
    }

    #[test]
    fn test_timeout_is_retryable_io() {
        let err: ServiceError = DriverError::Timeout {
            operation: "download `p/m/1.0`".to_string(),
            seconds: 300.0,
        }
        .into();
        assert!(matches!(err, ServiceError::DriverIo(_)));
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Driver I/O error: Timed out after 300.0s: download `p/m/1.0`"
        );
    }

    #[test]
    fn test_service_error_from_assets_error() {
        let err: ServiceError = "m:x"
            .parse::<model_assets_core::AssetSpecifier>()
            .unwrap_err()
            .into();
        assert!(matches!(err, ServiceError::InvalidSpecifier(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_batch_failed_display() {
        let err = ServiceError::BatchFailed(vec![ModelFailure {
            model: "b".to_string(),
            error: ServiceError::AssetNotFound("p/b/1.0".to_string()),
        }]);
        assert_eq!(
            err.to_string(),
            "Failed to resolve assets for 1 model(s): b (Asset not found: p/b/1.0)"
        );
        assert_eq!(err.failed_models(), vec!["b"]);
    }
}

//! Error types for asset specifiers, naming and settings

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, AssetsError>;

/// Main error type for the core domain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetsError {
    /// Malformed asset specifier
    #[error("Invalid asset specifier `{spec}`: {reason}")]
    InvalidSpecifier { spec: String, reason: String },

    /// Invalid version format
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid or inconsistent settings
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Malformed remote URI
    #[error("Invalid remote URI `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },
}

impl AssetsError {
    pub(crate) fn specifier(spec: &str, reason: impl Into<String>) -> Self {
        AssetsError::InvalidSpecifier {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AssetsError {
    fn from(err: serde_json::Error) -> Self {
        AssetsError::InvalidSettings(err.to_string())
    }
}

//! Data Transfer Objects (DTOs) for the service layer
//!
//! This module defines the values exchanged at service boundaries: fetch
//! reports, model configurations loaded from files, and serving entries.

use model_assets_core::{AssetSpecifier, AssetVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ServiceError, ServiceResult};

// ============================================================================
// Fetch DTOs
// ============================================================================

/// Outcome of fetching one asset into the local cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInfo {
    /// The specifier as requested
    pub spec: AssetSpecifier,

    /// Version the specifier resolved to
    pub version: AssetVersion,

    /// Local path of the asset, including the sub-part if any
    pub path: PathBuf,

    /// Remote object key of the asset version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,

    /// Whether bytes were transferred, as opposed to a cache hit
    pub downloaded: bool,
}

// ============================================================================
// Model configuration DTOs
// ============================================================================

/// Configuration of one model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    /// Asset specifier of the model, if it needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

impl ModelConfiguration {
    pub fn with_asset(asset: impl Into<String>) -> Self {
        Self {
            asset: Some(asset.into()),
        }
    }
}

/// Model name to model configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelsConfiguration {
    models: BTreeMap<String, ModelConfiguration>,
}

impl ModelsConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>, model: ModelConfiguration) -> Self {
        self.models.insert(name.into(), model);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ModelConfiguration> {
        self.models.get(name)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn from_toml_str(text: &str) -> ServiceResult<Self> {
        toml::from_str(text).map_err(|e| {
            ServiceError::AssetConfiguration(format!("invalid models configuration: {}", e))
        })
    }

    pub fn from_json_str(text: &str) -> ServiceResult<Self> {
        serde_json::from_str(text).map_err(|e| {
            ServiceError::AssetConfiguration(format!("invalid models configuration: {}", e))
        })
    }

    /// Load a models configuration file, JSON if the extension says so and
    /// TOML otherwise
    pub async fn from_path(path: &Path) -> ServiceResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServiceError::AssetConfiguration(format!(
                "cannot read models configuration `{}`: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Asset specifier declared by a model
    ///
    /// # Errors
    /// Returns `AssetConfiguration` if the model is unknown or declares no
    /// asset, `InvalidSpecifier` if its asset does not parse.
    pub fn asset_spec(&self, model: &str) -> ServiceResult<AssetSpecifier> {
        let configuration = self.get(model).ok_or_else(|| {
            ServiceError::AssetConfiguration(format!("model `{}` is not configured", model))
        })?;
        let asset = configuration.asset.as_deref().ok_or_else(|| {
            ServiceError::AssetConfiguration(format!("model `{}` declares no asset", model))
        })?;
        Ok(AssetSpecifier::parse(asset)?)
    }
}

// ============================================================================
// Serving DTOs
// ============================================================================

/// One model entry of a serving configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingEntry {
    /// Logical model name
    pub name: String,

    /// Resolved local path or remote URI of the model
    pub base_path: String,
}

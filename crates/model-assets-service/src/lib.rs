//! Service layer for model assets
//!
//! This crate sits between the storage drivers and the binary. It resolves
//! asset specifiers to locations and keeps the local cache populated.
//!
//! # Architecture
//!
//! - **AssetsManager**: version resolution, per-mode location computation and
//!   deduplicated fetches into the local cache
//! - **Batch resolution**: resolves every model of a configuration and
//!   aggregates failures
//! - **Serving**: renders resolved paths into a serving runtime configuration
//! - **Deployment**: the TensorFlow Serving deployment flow
//!
//! # Example
//!
//! ```rust,no_run
//! use model_assets_core::{AssetSpecifier, AssetsManagerSettings, ResolutionMode};
//! use model_assets_service::AssetsManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = AssetsManager::new(AssetsManagerSettings::local("/var/cache/assets"))?;
//! let spec: AssetSpecifier = "category/model:1.2[weights.bin]".parse()?;
//! let resolved = manager.get_local_path(&spec, ResolutionMode::LocalProcess).await?;
//! println!("{}", resolved);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod deploy;
pub mod dto;
pub mod error;
mod inflight;
pub mod manager;
pub mod serving;

// Re-export main types for convenience
pub use batch::{download_assets, resolve_assets, resolve_model_asset};
pub use deploy::{deploy_models, deploy_tf_models, DEFAULT_CONFIG_NAME};
pub use dto::*;
pub use error::{ModelFailure, ServiceError, ServiceResult};
pub use manager::AssetsManager;
pub use serving::{write_serving_config, ServingConfigWriter, TfServingConfigWriter};

//! Serving deployment
//!
//! Resolves the assets of the models to serve, makes sure local modes have
//! the bytes on disk, and writes the serving configuration into the assets
//! directory.

use model_assets_core::ResolutionMode;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::batch::{download_assets, resolve_assets};
use crate::dto::{ModelsConfiguration, ServingEntry};
use crate::error::ServiceResult;
use crate::manager::AssetsManager;
use crate::serving::{write_serving_config, ServingConfigWriter, TfServingConfigWriter};

/// Default serving configuration name
pub const DEFAULT_CONFIG_NAME: &str = "config";

/// Deploy models with any serving configuration writer
///
/// Returns the path of the written configuration,
/// `<assets_dir>/<config_name>.config`.
#[instrument(skip(manager, configuration, writer), fields(mode = %mode))]
pub async fn deploy_models(
    manager: &AssetsManager,
    configuration: &ModelsConfiguration,
    required_models: &[String],
    mode: ResolutionMode,
    config_name: &str,
    writer: &dyn ServingConfigWriter,
) -> ServiceResult<PathBuf> {
    let resolved = if mode.is_local() {
        info!("Checking that local models are present");
        let downloaded = download_assets(manager, configuration, required_models).await?;

        // Pin the downloaded versions so the configuration matches the cache
        let mut resolved = BTreeMap::new();
        for (model, path) in downloaded {
            let pinned = path.spec.with_version(path.version);
            resolved.insert(model, manager.get_local_path(&pinned, mode).await?);
        }
        resolved
    } else {
        resolve_assets(manager, configuration, required_models, mode).await?
    };
    let entries: Vec<ServingEntry> = resolved
        .into_iter()
        .map(|(name, path)| ServingEntry {
            name,
            base_path: path.location.to_string(),
        })
        .collect();

    let target = manager.assets_dir().join(format!("{}.config", config_name));
    write_serving_config(writer, &entries, &target).await?;
    Ok(target)
}

/// Deploy models for TensorFlow Serving
pub async fn deploy_tf_models(
    manager: &AssetsManager,
    configuration: &ModelsConfiguration,
    required_models: &[String],
    mode: ResolutionMode,
    config_name: &str,
) -> ServiceResult<PathBuf> {
    deploy_models(
        manager,
        configuration,
        required_models,
        mode,
        config_name,
        &TfServingConfigWriter::new(),
    )
    .await
}

//! Batch resolution
//!
//! Resolves the assets of several models at once. Every model is attempted,
//! concurrently, and all failures are reported together.

use futures::future::join_all;
use model_assets_core::{ResolutionMode, ResolvedPath};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use crate::dto::ModelsConfiguration;
use crate::error::{ModelFailure, ServiceError, ServiceResult};
use crate::manager::AssetsManager;

/// Resolve the asset of one configured model
///
/// # Errors
/// Returns `AssetConfiguration` if the model is unknown or declares no asset.
pub async fn resolve_model_asset(
    manager: &AssetsManager,
    configuration: &ModelsConfiguration,
    model: &str,
    mode: ResolutionMode,
) -> ServiceResult<ResolvedPath> {
    let spec = configuration.asset_spec(model)?;
    manager.get_local_path(&spec, mode).await
}

/// Resolve the assets of several models under one mode
///
/// # Errors
/// Returns `BatchFailed` naming every model that failed, once all of them
/// have been attempted.
#[instrument(skip(manager, configuration), fields(models = required_models.len()))]
pub async fn resolve_assets(
    manager: &AssetsManager,
    configuration: &ModelsConfiguration,
    required_models: &[String],
    mode: ResolutionMode,
) -> ServiceResult<BTreeMap<String, ResolvedPath>> {
    let outcomes = join_all(required_models.iter().map(|model| async move {
        let outcome = resolve_model_asset(manager, configuration, model, mode).await;
        (model.clone(), outcome)
    }))
    .await;

    let mut resolved = BTreeMap::new();
    let mut failures = Vec::new();
    for (model, outcome) in outcomes {
        match outcome {
            Ok(path) => {
                resolved.insert(model, path);
            }
            Err(error) => {
                warn!(model = %model, error = %error, "Failed to resolve model asset");
                failures.push(ModelFailure { model, error });
            }
        }
    }

    if !failures.is_empty() {
        return Err(ServiceError::BatchFailed(failures));
    }

    info!(count = resolved.len(), "Resolved model assets");
    Ok(resolved)
}

/// Make the assets of every required model available in the local cache
///
/// On success every returned path exists on disk.
pub async fn download_assets(
    manager: &AssetsManager,
    configuration: &ModelsConfiguration,
    required_models: &[String],
) -> ServiceResult<BTreeMap<String, ResolvedPath>> {
    resolve_assets(
        manager,
        configuration,
        required_models,
        ResolutionMode::LocalProcess,
    )
    .await
}

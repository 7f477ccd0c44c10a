//! Batch Integration Tests
//!
//! Tests for batch resolution with partial failures and the TF Serving
//! deployment flow.

mod common;

use common::TestAssets;
use model_assets_core::ResolutionMode;
use model_assets_service::{
    deploy_tf_models, download_assets, ModelConfiguration, ModelsConfiguration, ServiceError,
};

fn configuration() -> ModelsConfiguration {
    ModelsConfiguration::new()
        .with_model("model_a", ModelConfiguration::with_asset("a:1.0"))
        .with_model("model_b", ModelConfiguration::with_asset("b:1.0"))
        .with_model("model_c", ModelConfiguration::with_asset("c"))
        .with_model(
            "classifier",
            ModelConfiguration::with_asset("category/classifier"),
        )
        .with_model("rules", ModelConfiguration::default())
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn test_partial_failure_reports_only_failed_model() {
    let assets = TestAssets::new();

    let err = download_assets(
        &assets.manager,
        &configuration(),
        &models(&["model_a", "model_b", "model_c"]),
    )
    .await
    .unwrap_err();

    assert_eq!(err.failed_models(), vec!["model_b"]);
    match &err {
        ServiceError::BatchFailed(failures) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0].error, ServiceError::AssetNotFound(_)));
        }
        other => panic!("unexpected error: {}", other),
    }

    // A and C were still materialized
    assert_eq!(std::fs::read(assets.cached("a/1.0")).unwrap(), b"asset a");
    assert_eq!(std::fs::read(assets.cached("c/1.0")).unwrap(), b"asset c");
}

#[tokio::test]
async fn test_all_failures_are_aggregated() {
    let assets = TestAssets::new();

    let err = download_assets(
        &assets.manager,
        &configuration(),
        &models(&["model_b", "rules", "unknown", "model_a"]),
    )
    .await
    .unwrap_err();

    let mut failed = err.failed_models();
    failed.sort_unstable();
    assert_eq!(failed, vec!["model_b", "rules", "unknown"]);
}

#[tokio::test]
async fn test_successful_batch_paths_exist() {
    let assets = TestAssets::new();

    let resolved = download_assets(
        &assets.manager,
        &configuration(),
        &models(&["model_a", "classifier"]),
    )
    .await
    .unwrap();

    assert_eq!(resolved.len(), 2);
    for path in resolved.values() {
        assert!(path.location.local_path().unwrap().exists());
    }
    assert_eq!(
        resolved["classifier"].location.local_path().unwrap(),
        assets.cached("category/classifier/0.3")
    );
}

#[tokio::test]
async fn test_deploy_tf_models_local_process() {
    let assets = TestAssets::new();

    let target = deploy_tf_models(
        &assets.manager,
        &configuration(),
        &models(&["classifier", "model_a"]),
        ResolutionMode::LocalProcess,
        "serving",
    )
    .await
    .unwrap();

    assert_eq!(target, assets.cached("serving.config"));
    let text = std::fs::read_to_string(&target).unwrap();
    assert!(text.starts_with("model_config_list: {\n"));
    assert!(text.contains(&format!(
        "base_path: \"{}\"",
        assets.cached("category/classifier/0.3").display()
    )));
    assert!(text.contains("name: \"model_a\""));
    assert!(assets.cached("category/classifier/0.3/saved_model.pb").is_file());
}

#[tokio::test]
async fn test_deploy_fails_without_writing_config() {
    let assets = TestAssets::new();

    let err = deploy_tf_models(
        &assets.manager,
        &configuration(),
        &models(&["rules"]),
        ResolutionMode::LocalDocker,
        "config",
    )
    .await
    .unwrap_err();

    assert_eq!(err.failed_models(), vec!["rules"]);
    assert!(!assets.cached("config.config").exists());
}

//! Resolution Integration Tests
//!
//! Tests for version resolution and the location computed in each mode.

mod common;

use common::TestAssets;
use model_assets_core::{AssetLocation, AssetSpecifier, AssetVersion, ResolutionMode};
use model_assets_service::{AssetsManager, ServiceError};
use std::path::PathBuf;
use url::Url;

fn spec(text: &str) -> AssetSpecifier {
    text.parse().expect("valid specifier")
}

#[tokio::test]
async fn test_latest_version_selection_is_deterministic() {
    let assets = TestAssets::new();

    for _ in 0..3 {
        assert_eq!(
            assets.manager.resolve_version(&spec("m")).await.unwrap(),
            AssetVersion::new(2, 0)
        );
        assert_eq!(
            assets.manager.resolve_version(&spec("m:1")).await.unwrap(),
            AssetVersion::new(1, 2)
        );
    }
    assert_eq!(assets.driver.downloads(), 0);
}

#[tokio::test]
async fn test_remote_mode_yields_uri_without_local_io() {
    let assets = TestAssets::new();

    let resolved = assets
        .manager
        .get_local_path(&spec("category/classifier:0.3"), ResolutionMode::Remote)
        .await
        .unwrap();

    let uri = match &resolved.location {
        AssetLocation::Remote(uri) => Url::parse(uri).expect("well-formed URI"),
        other => panic!("expected a remote location, got {:?}", other),
    };
    assert_eq!(uri.scheme(), "file");
    assert!(uri.path().starts_with(assets.bucket.path().to_str().unwrap()));
    assert!(uri
        .path()
        .ends_with("/modelkit-assets/category/classifier/0.3"));

    assert_eq!(assets.driver.downloads(), 0);
    assert_eq!(std::fs::read_dir(assets.cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_local_docker_ignores_assets_dir() {
    let assets = TestAssets::new();

    let resolved = assets
        .manager
        .get_local_path(&spec("m:1[vocab/words.txt]"), ResolutionMode::LocalDocker)
        .await
        .unwrap();

    assert_eq!(
        resolved.location,
        AssetLocation::LocalMount(PathBuf::from("/config/m/1.2/vocab/words.txt"))
    );
    assert_eq!(resolved.version, AssetVersion::new(1, 2));
    assert_eq!(assets.driver.downloads(), 0);
}

#[tokio::test]
async fn test_local_process_materializes_asset() {
    let assets = TestAssets::new();

    let resolved = assets
        .manager
        .get_local_path(&spec("m:1.2[weights.bin]"), ResolutionMode::LocalProcess)
        .await
        .unwrap();

    let path = resolved.location.local_path().unwrap();
    assert_eq!(path, assets.cached("m/1.2/weights.bin"));
    assert_eq!(std::fs::read(path).unwrap(), b"m 1.2 weights");
    assert_eq!(
        std::fs::read(assets.cached("m/1.2/vocab/words.txt")).unwrap(),
        b"m 1.2 words"
    );
}

#[tokio::test]
async fn test_sub_part_is_not_checked_on_disk() {
    let assets = TestAssets::new();

    let resolved = assets
        .manager
        .get_local_path(&spec("m:2.0[does/not/exist]"), ResolutionMode::LocalProcess)
        .await
        .unwrap();

    assert_eq!(
        resolved.location.local_path().unwrap(),
        assets.cached("m/2.0/does/not/exist")
    );
}

#[tokio::test]
async fn test_missing_asset_is_not_found() {
    let assets = TestAssets::new();

    let err = assets
        .manager
        .get_local_path(&spec("b:1.0"), ResolutionMode::LocalProcess)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AssetNotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_local_only_manager_cannot_resolve_latest() {
    let cache = tempfile::tempdir().unwrap();
    let manager =
        AssetsManager::new(model_assets_core::AssetsManagerSettings::local(cache.path())).unwrap();

    let err = manager
        .get_local_path(&spec("m"), ResolutionMode::LocalDocker)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::VersionResolution(_)));
}

#[tokio::test]
async fn test_list_assets() {
    let assets = TestAssets::new();

    let listing = assets.manager.list_assets().await.unwrap();
    let names: Vec<&str> = listing.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["a", "c", "category/classifier", "m"]);
    assert_eq!(
        listing["m"].iter().copied().collect::<Vec<_>>(),
        vec![
            AssetVersion::new(1, 0),
            AssetVersion::new(1, 2),
            AssetVersion::new(2, 0)
        ]
    );
}

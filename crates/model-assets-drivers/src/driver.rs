//! Storage driver trait
//!
//! This module defines the StorageDriver trait: the minimal set of remote
//! storage operations asset resolution needs, implemented once per backend
//! (local filesystem, GCS, S3, S3 with SSM-sourced credentials).

use async_trait::async_trait;
use model_assets_core::naming::version_from_key;
use model_assets_core::{AssetVersion, StorageProvider};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};

/// Name of the staged payload inside a staging directory
const STAGED_PAYLOAD: &str = "payload";

/// Name of a replaced copy inside a staging directory
const PREVIOUS_PAYLOAD: &str = "previous";

/// Staging directory next to `destination`, removed when dropped
async fn staging_dir(destination: &Path) -> DriverResult<TempDir> {
    let parent = destination.parent().ok_or_else(|| {
        DriverError::Configuration(format!(
            "destination `{}` has no parent directory",
            destination.display()
        ))
    })?;
    tokio::fs::create_dir_all(parent).await?;

    Ok(tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)?)
}

/// Remote storage operations against one concrete backend
///
/// Keys are `/`-separated object names relative to the bucket. An asset
/// version is either a single object stored at its key or a tree of objects
/// stored below it.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Backend kind
    fn provider(&self) -> StorageProvider;

    /// Bucket name, or root directory for the local backend
    fn bucket(&self) -> &str;

    /// Check whether an object or a non-empty prefix exists at `key`
    ///
    /// A missing key is `Ok(false)`; only genuine I/O or authentication
    /// failures are errors.
    async fn exists(&self, key: &str) -> DriverResult<bool>;

    /// Enumerate every object key starting with `prefix`
    async fn list(&self, prefix: &str) -> DriverResult<Vec<String>>;

    /// Copy the object or object tree at `key` to `destination`
    ///
    /// This writes directly to `destination` and may leave partial content
    /// behind on failure; callers wanting atomic results use [`fetch`].
    ///
    /// [`fetch`]: StorageDriver::fetch
    async fn download(&self, key: &str, destination: &Path) -> DriverResult<()>;

    /// URI addressing `key` directly on the backend
    fn object_uri(&self, key: &str) -> String {
        format!("{}://{}/{}", self.provider().uri_scheme(), self.bucket(), key)
    }

    /// Versions available below `name_prefix`
    ///
    /// # Errors
    /// Returns `NotFound` if no version exists.
    async fn list_versions(&self, name_prefix: &str) -> DriverResult<BTreeSet<AssetVersion>> {
        let versions: BTreeSet<AssetVersion> = self
            .list(name_prefix)
            .await?
            .iter()
            .filter_map(|key| version_from_key(name_prefix, key))
            .collect();

        if versions.is_empty() {
            return Err(DriverError::NotFound(format!(
                "no asset versions under `{}`",
                name_prefix
            )));
        }

        debug!(
            provider = %self.provider(),
            name_prefix,
            count = versions.len(),
            "Listed asset versions"
        );
        Ok(versions)
    }

    /// Atomically materialize the object or tree at `key` at `destination`
    ///
    /// The content is downloaded into a staging directory next to
    /// `destination` and renamed into place once complete, so an interrupted
    /// fetch never leaves a complete-looking `destination`. If another
    /// process renamed the same asset into place first, its copy is kept.
    async fn fetch(&self, key: &str, destination: &Path) -> DriverResult<()> {
        let staging = staging_dir(destination).await?;
        let staged = staging.path().join(STAGED_PAYLOAD);

        self.download(key, &staged).await?;

        match tokio::fs::rename(&staged, destination).await {
            Ok(()) => {
                debug!(key, destination = %destination.display(), "Fetched object into place");
                Ok(())
            }
            Err(_) if tokio::fs::try_exists(destination).await.unwrap_or(false) => {
                debug!(
                    key,
                    destination = %destination.display(),
                    "Destination produced concurrently, keeping existing copy"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the content at `destination` with a fresh copy of `key`
    ///
    /// The new copy is staged completely before the existing one is moved
    /// aside, so a failed transfer keeps the existing copy and `destination`
    /// never holds a mix of both.
    async fn refetch(&self, key: &str, destination: &Path) -> DriverResult<()> {
        let staging = staging_dir(destination).await?;
        let staged = staging.path().join(STAGED_PAYLOAD);
        let previous = staging.path().join(PREVIOUS_PAYLOAD);

        self.download(key, &staged).await?;

        let displaced = match tokio::fs::rename(destination, &previous).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = tokio::fs::rename(&staged, destination).await {
            if displaced {
                if let Err(restore) = tokio::fs::rename(&previous, destination).await {
                    warn!(
                        destination = %destination.display(),
                        error = %restore,
                        "Could not restore replaced copy"
                    );
                }
            }
            return Err(e.into());
        }

        debug!(
            key,
            destination = %destination.display(),
            replaced = displaced,
            "Refetched object into place"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes one file then fails, or succeeds when `fail` is false
    struct FlakyDriver {
        fail: bool,
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl StorageDriver for FlakyDriver {
        fn provider(&self) -> StorageProvider {
            StorageProvider::Local
        }

        fn bucket(&self) -> &str {
            "/bucket"
        }

        async fn exists(&self, _key: &str) -> DriverResult<bool> {
            Ok(true)
        }

        async fn list(&self, _prefix: &str) -> DriverResult<Vec<String>> {
            Ok(vec![
                "p/m/1.0".to_string(),
                "p/m/1.2/weights.bin".to_string(),
                "p/m/2.0/a".to_string(),
                "p/m/2.0/b".to_string(),
                "p/m/nested/3.0".to_string(),
            ])
        }

        async fn download(&self, _key: &str, destination: &Path) -> DriverResult<()> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            tokio::fs::create_dir_all(destination).await?;
            tokio::fs::write(destination.join("part-1"), b"first half").await?;
            if self.fail {
                return Err(DriverError::Io("connection reset".to_string()));
            }
            tokio::fs::write(destination.join("part-2"), b"second half").await?;
            Ok(())
        }
    }

    fn flaky(fail: bool) -> FlakyDriver {
        FlakyDriver {
            fail,
            downloads: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_list_versions_skips_nested_assets() {
        let versions = flaky(false).list_versions("p/m/").await.unwrap();
        let expected: BTreeSet<_> = [(1, 0), (1, 2), (2, 0)]
            .into_iter()
            .map(|(a, b)| AssetVersion::new(a, b))
            .collect();
        assert_eq!(versions, expected);
    }

    #[tokio::test]
    async fn test_list_versions_empty_is_not_found() {
        let err = flaky(false).list_versions("p/unknown/").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fetch_moves_complete_tree_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("m").join("1.0");

        flaky(false).fetch("p/m/1.0", &destination).await.unwrap();

        assert!(destination.join("part-1").is_file());
        assert!(destination.join("part-2").is_file());
        // The staging directory is cleaned up
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("m"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("1.0")]);
    }

    #[tokio::test]
    async fn test_interrupted_fetch_leaves_no_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("m").join("1.0");

        let driver = flaky(true);
        let err = driver.fetch("p/m/1.0", &destination).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(dir.path().join("m")).unwrap().count(), 0);

        // A later attempt starts from scratch
        flaky(false).fetch("p/m/1.0", &destination).await.unwrap();
        assert!(destination.join("part-2").is_file());
    }

    #[tokio::test]
    async fn test_fetch_keeps_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("m").join("1.0");
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(destination.join("existing"), b"x").unwrap();

        flaky(false).fetch("p/m/1.0", &destination).await.unwrap();
        assert!(destination.join("existing").is_file());
    }

    #[test]
    fn test_default_object_uri() {
        assert_eq!(flaky(false).object_uri("p/m/1.0"), "file:///bucket/p/m/1.0");
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_existing_copy() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("m").join("1.0");
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(destination.join("existing"), b"good").unwrap();

        let err = flaky(true).refetch("p/m/1.0", &destination).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(std::fs::read(destination.join("existing")).unwrap(), b"good");
        assert!(!destination.join("part-1").exists());
        assert_eq!(std::fs::read_dir(dir.path().join("m")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_refetch_replaces_existing_copy() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("m").join("1.0");
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(destination.join("existing"), b"stale").unwrap();

        flaky(false).refetch("p/m/1.0", &destination).await.unwrap();

        assert!(!destination.join("existing").exists());
        assert!(destination.join("part-2").is_file());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("m"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("1.0")]);
    }
}

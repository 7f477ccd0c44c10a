//! Local filesystem driver
//!
//! Treats a directory as the bucket: object keys are relative paths below it
//! and downloading is a plain copy.

use async_trait::async_trait;
use model_assets_core::{LocalDriverSettings, StorageProvider};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

use crate::driver::StorageDriver;
use crate::error::{DriverError, DriverResult};

/// Driver serving assets from a local directory
#[derive(Debug, Clone)]
pub struct LocalStorageDriver {
    root: PathBuf,
    bucket: String,
}

impl LocalStorageDriver {
    /// Create a driver rooted at the configured bucket directory
    ///
    /// # Errors
    /// Returns a configuration error if the bucket is not an existing
    /// directory.
    pub fn new(settings: &LocalDriverSettings) -> DriverResult<Self> {
        let root = settings.bucket.clone();
        if !root.is_dir() {
            return Err(DriverError::Configuration(format!(
                "local bucket `{}` is not a directory",
                root.display()
            )));
        }

        Ok(Self {
            bucket: root.display().to_string(),
            root,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// Every regular file below `root`
async fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

async fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<u64> {
    let mut copied = 0;
    for file in walk_files(source).await? {
        let relative = file
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        copied += fs::copy(&file, &target).await?;
    }
    Ok(copied)
}

#[async_trait]
impl StorageDriver for LocalStorageDriver {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, key: &str) -> DriverResult<bool> {
        Ok(fs::try_exists(self.path_for(key)).await?)
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> DriverResult<Vec<String>> {
        // Walk from the deepest directory fully named by the prefix
        let base = match prefix.rfind('/') {
            Some(idx) => self.path_for(&prefix[..idx]),
            None => self.root.clone(),
        };
        if !fs::try_exists(&base).await? {
            return Ok(Vec::new());
        }

        let mut keys: Vec<String> = walk_files(&base)
            .await?
            .iter()
            .filter_map(|path| self.key_for(path))
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();

        debug!(count = keys.len(), "Listed local objects");
        Ok(keys)
    }

    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    async fn download(&self, key: &str, destination: &Path) -> DriverResult<()> {
        let source = self.path_for(key);
        let metadata = match fs::metadata(&source).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DriverError::NotFound(format!(
                    "`{}` in local bucket `{}`",
                    key, self.bucket
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = if metadata.is_dir() {
            fs::create_dir_all(destination).await?;
            copy_tree(&source, destination).await?
        } else {
            fs::copy(&source, destination).await?
        };

        debug!(bytes, "Copied local object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_with_assets() -> (tempfile::TempDir, LocalStorageDriver) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("p/m")).unwrap();
        std::fs::write(root.join("p/m/1.0"), b"single file asset").unwrap();
        std::fs::create_dir_all(root.join("p/m/2.1/sub")).unwrap();
        std::fs::write(root.join("p/m/2.1/a.txt"), b"a").unwrap();
        std::fs::write(root.join("p/m/2.1/sub/b.txt"), b"b").unwrap();
        std::fs::create_dir_all(root.join("p/m2")).unwrap();
        std::fs::write(root.join("p/m2/0.1"), b"other").unwrap();

        let driver = LocalStorageDriver::new(&LocalDriverSettings {
            bucket: root.to_path_buf(),
        })
        .unwrap();
        (dir, driver)
    }

    #[test]
    fn test_missing_bucket_is_configuration_error() {
        let err = LocalStorageDriver::new(&LocalDriverSettings {
            bucket: PathBuf::from("/definitely/not/a/bucket"),
        })
        .unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_exists() {
        let (_dir, driver) = bucket_with_assets();
        assert!(driver.exists("p/m/1.0").await.unwrap());
        assert!(driver.exists("p/m/2.1").await.unwrap());
        assert!(!driver.exists("p/m/9.9").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_respects_prefix_boundaries() {
        let (_dir, driver) = bucket_with_assets();
        let keys = driver.list("p/m/").await.unwrap();
        assert_eq!(keys, vec!["p/m/1.0", "p/m/2.1/a.txt", "p/m/2.1/sub/b.txt"]);

        assert!(driver.list("p/unknown/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_versions() {
        let (_dir, driver) = bucket_with_assets();
        let versions = driver.list_versions("p/m/").await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn test_download_file_and_tree() {
        let (_dir, driver) = bucket_with_assets();
        let out = tempfile::tempdir().unwrap();

        let file_dest = out.path().join("file");
        driver.download("p/m/1.0", &file_dest).await.unwrap();
        assert_eq!(std::fs::read(&file_dest).unwrap(), b"single file asset");

        let tree_dest = out.path().join("tree");
        driver.download("p/m/2.1", &tree_dest).await.unwrap();
        assert_eq!(std::fs::read(tree_dest.join("sub/b.txt")).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let (_dir, driver) = bucket_with_assets();
        let out = tempfile::tempdir().unwrap();
        let err = driver
            .download("p/m/7.0", &out.path().join("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_object_uri() {
        let (dir, driver) = bucket_with_assets();
        assert_eq!(
            driver.object_uri("p/m/1.0"),
            format!("file://{}/p/m/1.0", dir.path().display())
        );
    }
}

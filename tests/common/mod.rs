//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a local
//! bucket populated with fixture assets, a cache directory, and a driver
//! wrapper that counts transfers and can simulate failures.

#![allow(dead_code)]

use async_trait::async_trait;
use model_assets_core::{
    AssetsManagerSettings, DriverSettings, LocalDriverSettings, RemoteAssetsStoreSettings,
    StorageProvider,
};
use model_assets_drivers::{DriverError, DriverResult, LocalStorageDriver, StorageDriver};
use model_assets_service::AssetsManager;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub mod fixtures;

/// Local bucket driver that counts downloads
///
/// Downloads can be slowed down, and the first `failures` downloads write
/// part of the asset then fail.
pub struct CountingDriver {
    inner: LocalStorageDriver,
    downloads: AtomicUsize,
    failures: AtomicUsize,
    delay: Duration,
}

impl CountingDriver {
    pub fn new(bucket: &Path) -> Self {
        Self {
            inner: LocalStorageDriver::new(&LocalDriverSettings {
                bucket: bucket.to_path_buf(),
            })
            .expect("Failed to create local driver"),
            downloads: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failures(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    /// Make the next `failures` downloads fail
    pub fn fail_next(&self, failures: usize) {
        self.failures.store(failures, Ordering::SeqCst);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageDriver for CountingDriver {
    fn provider(&self) -> StorageProvider {
        self.inner.provider()
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn exists(&self, key: &str) -> DriverResult<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> DriverResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn download(&self, key: &str, destination: &Path) -> DriverResult<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            tokio::fs::create_dir_all(destination).await?;
            tokio::fs::write(destination.join("partial"), b"half an asset").await?;
            return Err(DriverError::Io("connection reset by peer".to_string()));
        }

        self.inner.download(key, destination).await
    }
}

/// A bucket, a cache and a manager wired together
pub struct TestAssets {
    pub bucket: TempDir,
    pub cache: TempDir,
    pub driver: Arc<CountingDriver>,
    pub manager: Arc<AssetsManager>,
}

impl TestAssets {
    /// Fixture bucket with the default driver
    pub fn new() -> Self {
        Self::with_driver(|bucket| CountingDriver::new(bucket))
    }

    /// Fixture bucket with a customized driver
    pub fn with_driver(build: impl FnOnce(&Path) -> CountingDriver) -> Self {
        let bucket = tempfile::tempdir().expect("Failed to create bucket dir");
        fixtures::populate_bucket(bucket.path());
        let cache = tempfile::tempdir().expect("Failed to create cache dir");

        let driver = Arc::new(build(bucket.path()));
        let manager = AssetsManager::with_driver(
            manager_settings(bucket.path(), cache.path()),
            Arc::clone(&driver) as Arc<dyn StorageDriver>,
        )
        .expect("Failed to create assets manager");

        Self {
            bucket,
            cache,
            driver,
            manager: Arc::new(manager),
        }
    }

    /// Path of an asset inside the cache
    pub fn cached(&self, relative: &str) -> PathBuf {
        self.cache.path().join(relative)
    }
}

/// Manager settings for a local bucket
pub fn manager_settings(bucket: &Path, cache: &Path) -> AssetsManagerSettings {
    AssetsManagerSettings::local(cache).with_remote_store(RemoteAssetsStoreSettings::new(
        DriverSettings::Local(LocalDriverSettings {
            bucket: bucket.to_path_buf(),
        }),
    ))
}

//! Storage drivers for model assets
//!
//! This crate provides the remote storage side of asset management:
//! - The [`StorageDriver`] trait: existence checks, prefix listing, version
//!   enumeration and atomic fetches into a local destination
//! - A local filesystem driver, where the bucket is a directory
//! - GCS and S3 drivers built on `object_store`
//! - An S3 driver whose credentials come from AWS SSM Parameter Store and are
//!   refreshed once when rejected
//!
//! The backend set is closed: [`build_driver`] selects the implementation
//! from validated [`RemoteAssetsStoreSettings`].
//!
//! # Example
//!
//! ```rust,no_run
//! use model_assets_core::{DriverSettings, LocalDriverSettings, RemoteAssetsStoreSettings};
//! use model_assets_drivers::build_driver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = RemoteAssetsStoreSettings::new(DriverSettings::Local(LocalDriverSettings {
//!     bucket: "/srv/assets-bucket".into(),
//! }));
//! let driver = build_driver(&settings)?;
//! let versions = driver.list_versions("modelkit-assets/my-model/").await?;
//! # Ok(())
//! # }
//! ```

pub mod cloud;
pub mod driver;
pub mod error;
pub mod local;
pub mod ssm;

pub use cloud::{ObjectStoreDriver, S3Credentials, S3Location};
pub use driver::StorageDriver;
pub use error::{DriverError, DriverResult};
pub use local::LocalStorageDriver;
pub use ssm::{CredentialRefreshingDriver, DriverFactory, SecretsSource, SsmParameterSource};

use model_assets_core::{DriverSettings, RemoteAssetsStoreSettings};
use std::sync::Arc;
use tracing::info;

/// Build the driver selected by the settings
///
/// # Errors
/// Returns a configuration error if the settings are invalid or the backend
/// client cannot be configured.
pub fn build_driver(settings: &RemoteAssetsStoreSettings) -> DriverResult<Arc<dyn StorageDriver>> {
    settings
        .validate()
        .map_err(|e| DriverError::Configuration(e.to_string()))?;

    let timeout = settings.timeout();
    let driver: Arc<dyn StorageDriver> = match &settings.driver {
        DriverSettings::Local(s) => Arc::new(LocalStorageDriver::new(s)?),
        DriverSettings::Gcs(s) => Arc::new(ObjectStoreDriver::gcs(s, timeout)?),
        DriverSettings::S3(s) => Arc::new(ObjectStoreDriver::s3(s, timeout)?),
        DriverSettings::S3Ssm(s) => Arc::new(CredentialRefreshingDriver::from_ssm_settings(s, timeout)),
    };

    info!(
        provider = %driver.provider(),
        bucket = driver.bucket(),
        prefix = %settings.assetsmanager_prefix,
        "Storage driver ready"
    );
    Ok(driver)
}

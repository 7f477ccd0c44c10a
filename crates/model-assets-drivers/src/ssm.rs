//! S3 driver with credentials from AWS SSM Parameter Store
//!
//! Credentials are read from the parameter store right before the first
//! network call, not at construction. When the bucket rejects them (rotated
//! or expired keys), they are read again and the operation is retried once.

use async_trait::async_trait;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::DisplayErrorContext;
use model_assets_core::{S3SsmDriverSettings, StorageProvider};
use secrecy::SecretString;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, instrument, warn};

use crate::cloud::{ObjectStoreDriver, S3Credentials, S3Location};
use crate::driver::StorageDriver;
use crate::error::{DriverError, DriverResult};

/// Source of short-lived S3 credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretsSource: Send + Sync {
    /// Read the current credentials
    async fn s3_credentials(&self) -> DriverResult<S3Credentials>;
}

/// Reads S3 credentials from SSM parameters
pub struct SsmParameterSource {
    settings: S3SsmDriverSettings,
    client: OnceCell<aws_sdk_ssm::Client>,
}

impl SsmParameterSource {
    pub fn new(settings: S3SsmDriverSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &aws_sdk_ssm::Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
                if let Some(region) = &self.settings.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                aws_sdk_ssm::Client::new(&loader.load().await)
            })
            .await
    }

    async fn parameter(&self, name: &str) -> DriverResult<String> {
        let output = self
            .client()
            .await
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                DriverError::Io(format!(
                    "failed to read SSM parameter `{}`: {}",
                    name,
                    DisplayErrorContext(&e)
                ))
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| {
                DriverError::Configuration(format!("SSM parameter `{}` has no value", name))
            })
    }
}

#[async_trait]
impl SecretsSource for SsmParameterSource {
    #[instrument(skip(self))]
    async fn s3_credentials(&self) -> DriverResult<S3Credentials> {
        let access_key_id = self.parameter(&self.settings.access_key_parameter).await?;
        let secret_access_key = self.parameter(&self.settings.secret_key_parameter).await?;
        let session_token = match &self.settings.session_token_parameter {
            Some(name) => Some(SecretString::new(self.parameter(name).await?)),
            None => None,
        };

        Ok(S3Credentials {
            access_key_id,
            secret_access_key: SecretString::new(secret_access_key),
            session_token,
        })
    }
}

/// Builds the underlying driver from a set of credentials
pub type DriverFactory =
    Arc<dyn Fn(&S3Credentials) -> DriverResult<Arc<dyn StorageDriver>> + Send + Sync>;

/// Driver built from one set of credentials
#[derive(Clone)]
struct LoadedDriver {
    generation: u64,
    driver: Arc<dyn StorageDriver>,
}

/// Driver that obtains its credentials lazily and refreshes them once on
/// authentication failure
pub struct CredentialRefreshingDriver {
    provider: StorageProvider,
    bucket: String,
    secrets: Arc<dyn SecretsSource>,
    factory: DriverFactory,
    current: RwLock<Option<LoadedDriver>>,
}

impl CredentialRefreshingDriver {
    pub fn new(
        provider: StorageProvider,
        bucket: impl Into<String>,
        secrets: Arc<dyn SecretsSource>,
        factory: DriverFactory,
    ) -> Self {
        Self {
            provider,
            bucket: bucket.into(),
            secrets,
            factory,
            current: RwLock::new(None),
        }
    }

    /// S3 driver whose credentials live in SSM parameters
    pub fn from_ssm_settings(settings: &S3SsmDriverSettings, timeout: Duration) -> Self {
        let location = S3Location {
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };
        let factory: DriverFactory = Arc::new(move |credentials: &S3Credentials| {
            let driver = ObjectStoreDriver::s3_with_credentials(
                &location,
                Some(credentials),
                StorageProvider::S3Ssm,
                timeout,
            )?;
            Ok(Arc::new(driver) as Arc<dyn StorageDriver>)
        });

        Self::new(
            StorageProvider::S3Ssm,
            &settings.bucket,
            Arc::new(SsmParameterSource::new(settings.clone())),
            factory,
        )
    }

    async fn current(&self) -> DriverResult<LoadedDriver> {
        if let Some(loaded) = self.current.read().await.as_ref() {
            return Ok(loaded.clone());
        }
        self.refresh(None).await
    }

    /// Read credentials again unless another caller already replaced the
    /// `rejected` generation (or loaded the first one)
    async fn refresh(&self, rejected: Option<u64>) -> DriverResult<LoadedDriver> {
        let mut current = self.current.write().await;
        if let Some(loaded) = current.as_ref() {
            if rejected != Some(loaded.generation) {
                return Ok(loaded.clone());
            }
        }

        let credentials = self.secrets.s3_credentials().await?;
        let loaded = LoadedDriver {
            generation: current.as_ref().map_or(1, |l| l.generation + 1),
            driver: (self.factory)(&credentials)?,
        };
        *current = Some(loaded.clone());
        info!(
            bucket = %self.bucket,
            generation = loaded.generation,
            "Loaded S3 credentials from secrets source"
        );
        Ok(loaded)
    }

    async fn with_refresh<T, F, Fut>(&self, op: F) -> DriverResult<T>
    where
        F: Fn(Arc<dyn StorageDriver>) -> Fut + Send + Sync,
        Fut: Future<Output = DriverResult<T>> + Send,
    {
        let loaded = self.current().await?;
        match op(loaded.driver).await {
            Err(e) if e.is_authentication() => {
                warn!(bucket = %self.bucket, error = %e, "Credentials rejected, refreshing once");
                let refreshed = self.refresh(Some(loaded.generation)).await?;
                op(refreshed.driver).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl StorageDriver for CredentialRefreshingDriver {
    fn provider(&self) -> StorageProvider {
        self.provider
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, key: &str) -> DriverResult<bool> {
        self.with_refresh(|driver| async move { driver.exists(key).await })
            .await
    }

    async fn list(&self, prefix: &str) -> DriverResult<Vec<String>> {
        self.with_refresh(|driver| async move { driver.list(prefix).await })
            .await
    }

    async fn download(&self, key: &str, destination: &Path) -> DriverResult<()> {
        self.with_refresh(|driver| async move { driver.download(key, destination).await })
            .await
    }
}

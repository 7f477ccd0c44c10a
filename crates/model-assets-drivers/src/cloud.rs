//! Object store driver for GCS and S3
//!
//! Both cloud backends go through the `object_store` crate; this driver adds
//! the asset semantics on top: a key is either one object or a prefix of
//! objects, and every download attempt is bounded by the store timeout.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use model_assets_core::{GcsDriverSettings, S3DriverSettings, StorageProvider};
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectMeta, ObjectStore};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::driver::StorageDriver;
use crate::error::{DriverError, DriverResult};

/// Static S3 credentials
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

/// Connection parameters of an S3 bucket
#[derive(Debug, Clone, Default)]
pub struct S3Location {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Driver over any `object_store` backend
#[derive(Debug, Clone)]
pub struct ObjectStoreDriver {
    store: Arc<dyn ObjectStore>,
    provider: StorageProvider,
    bucket: String,
    timeout: Duration,
}

fn client_options(timeout: Duration) -> ClientOptions {
    ClientOptions::new().with_timeout(timeout)
}

fn configuration_error(err: object_store::Error) -> DriverError {
    DriverError::Configuration(err.to_string())
}

impl ObjectStoreDriver {
    /// Wrap an already configured store
    pub fn new(
        store: Arc<dyn ObjectStore>,
        provider: StorageProvider,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            bucket: bucket.into(),
            timeout,
        }
    }

    /// Google Cloud Storage driver
    ///
    /// Uses the service account file when configured, the `GOOGLE_*`
    /// environment and application default credentials otherwise.
    pub fn gcs(settings: &GcsDriverSettings, timeout: Duration) -> DriverResult<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&settings.bucket)
            .with_client_options(client_options(timeout));
        if let Some(path) = &settings.service_account_path {
            builder = builder.with_service_account_path(path.to_string_lossy());
        }

        let store = builder.build().map_err(configuration_error)?;
        info!(bucket = %settings.bucket, "Configured GCS driver");
        Ok(Self::new(Arc::new(store), StorageProvider::Gcs, &settings.bucket, timeout))
    }

    /// Amazon S3 driver
    ///
    /// Static credentials from the settings take precedence over the `AWS_*`
    /// environment.
    pub fn s3(settings: &S3DriverSettings, timeout: Duration) -> DriverResult<Self> {
        let location = S3Location {
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };
        let credentials = match (&settings.access_key_id, &settings.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(S3Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: settings.session_token.clone(),
            }),
            _ => None,
        };

        Self::s3_with_credentials(&location, credentials.as_ref(), StorageProvider::S3, timeout)
    }

    /// S3 driver with explicit credentials
    pub fn s3_with_credentials(
        location: &S3Location,
        credentials: Option<&S3Credentials>,
        provider: StorageProvider,
        timeout: Duration,
    ) -> DriverResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&location.bucket)
            .with_client_options(client_options(timeout));
        if let Some(region) = &location.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &location.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(credentials) = credentials {
            builder = builder
                .with_access_key_id(&credentials.access_key_id)
                .with_secret_access_key(credentials.secret_access_key.expose_secret());
            if let Some(token) = &credentials.session_token {
                builder = builder.with_token(token.expose_secret());
            }
        }

        let store = builder.build().map_err(configuration_error)?;
        info!(bucket = %location.bucket, provider = %provider, "Configured S3 driver");
        Ok(Self::new(Arc::new(store), provider, &location.bucket, timeout))
    }

    async fn write_object(&self, location: &ObjectPath, destination: &Path) -> DriverResult<u64> {
        let stream = self.store.get(location).await?.into_stream();
        write_stream(stream, destination).await
    }

    async fn download_untimed(&self, key: &str, destination: &Path) -> DriverResult<u64> {
        let location = ObjectPath::from(key);

        match self.write_object(&location, destination).await {
            Err(DriverError::NotFound(_)) => {}
            other => return other,
        }

        // Not a single object: download every object below the key
        let objects: Vec<ObjectMeta> = self.store.list(Some(&location)).try_collect().await?;
        if objects.is_empty() {
            return Err(DriverError::NotFound(format!(
                "`{}` in bucket `{}`",
                key, self.bucket
            )));
        }

        tokio::fs::create_dir_all(destination).await?;
        let mut total = 0;
        for meta in objects {
            let relative = match meta.location.prefix_match(&location) {
                Some(parts) => parts.fold(destination.to_path_buf(), |path, part| {
                    path.join(part.as_ref())
                }),
                None => continue,
            };
            total += self.write_object(&meta.location, &relative).await?;
        }
        Ok(total)
    }
}

async fn write_stream(
    mut stream: BoxStream<'static, object_store::Result<Bytes>>,
    destination: &Path,
) -> DriverResult<u64> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(destination).await?;
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.sync_all().await?;
    Ok(written)
}

#[async_trait]
impl StorageDriver for ObjectStoreDriver {
    fn provider(&self) -> StorageProvider {
        self.provider
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> DriverResult<bool> {
        let location = ObjectPath::from(key);
        match self.store.head(&location).await {
            Ok(_) => return Ok(true),
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        match self.store.list(Some(&location)).next().await {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e.into()),
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> DriverResult<Vec<String>> {
        let location = ObjectPath::from(prefix);
        let keys: Vec<String> = self
            .store
            .list(Some(&location))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;

        debug!(count = keys.len(), "Listed remote objects");
        Ok(keys)
    }

    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    async fn download(&self, key: &str, destination: &Path) -> DriverResult<()> {
        let bytes = tokio::time::timeout(self.timeout, self.download_untimed(key, destination))
            .await
            .map_err(|_| DriverError::Timeout {
                operation: format!("download `{}`", key),
                seconds: self.timeout.as_secs_f64(),
            })??;

        debug!(bytes, "Downloaded remote object");
        Ok(())
    }
}

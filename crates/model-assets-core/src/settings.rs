//! Assets manager settings
//!
//! This module defines the validated configuration contract of the assets
//! manager: which storage backend holds remote assets, under which key
//! prefix, and where the local cache lives. Settings are plain values built
//! once at startup and handed to the manager; nothing here reads the
//! environment.
//!
//! Driver settings are a tagged union keyed by `storage_provider`. Each
//! variant only accepts its own fields, so a payload such as
//! `{"storage_provider": "s3", "service_account_path": "..."}` is rejected
//! before any driver is built. The provider fields may also be nested under
//! `settings`, as in `{"storage_provider": "local", "settings": {"bucket": ...}}`.

use secrecy::SecretString;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{AssetsError, Result};

/// Default key prefix of every remote object
pub const DEFAULT_ASSETS_PREFIX: &str = "modelkit-assets";

/// Default timeout of one remote fetch attempt, in seconds
pub const DEFAULT_TIMEOUT_S: f64 = 300.0;

/// Default SSM parameter holding the AWS access key id
pub const DEFAULT_SSM_ACCESS_KEY_PARAMETER: &str = "/modelkit/assets/aws_access_key_id";

/// Default SSM parameter holding the AWS secret access key
pub const DEFAULT_SSM_SECRET_KEY_PARAMETER: &str = "/modelkit/assets/aws_secret_access_key";

/// Supported storage providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageProvider {
    Local,
    Gcs,
    S3,
    S3Ssm,
}

impl StorageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProvider::Local => "local",
            StorageProvider::Gcs => "gcs",
            StorageProvider::S3 => "s3",
            StorageProvider::S3Ssm => "s3ssm",
        }
    }

    /// URI scheme of objects stored with this provider
    pub fn uri_scheme(&self) -> &'static str {
        match self {
            StorageProvider::Local => "file",
            StorageProvider::Gcs => "gs",
            StorageProvider::S3 | StorageProvider::S3Ssm => "s3",
        }
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local filesystem driver settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalDriverSettings {
    /// Root directory acting as the bucket
    pub bucket: PathBuf,
}

/// Google Cloud Storage driver settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GcsDriverSettings {
    /// GCS bucket name
    pub bucket: String,
    /// Service account key file; application default credentials otherwise
    pub service_account_path: Option<PathBuf>,
}

/// Amazon S3 (or S3-compatible) driver settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3DriverSettings {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region (e.g. "us-east-1")
    pub region: Option<String>,
    /// Endpoint URL for S3-compatible services
    pub endpoint: Option<String>,
    /// Static access key id; the AWS credential chain otherwise
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
}

/// S3 driver settings with credentials read from AWS SSM Parameter Store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3SsmDriverSettings {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region of both the bucket and the parameter store
    pub region: Option<String>,
    /// Endpoint URL for S3-compatible services
    pub endpoint: Option<String>,
    #[serde(default = "default_access_key_parameter")]
    pub access_key_parameter: String,
    #[serde(default = "default_secret_key_parameter")]
    pub secret_key_parameter: String,
    pub session_token_parameter: Option<String>,
}

fn default_access_key_parameter() -> String {
    DEFAULT_SSM_ACCESS_KEY_PARAMETER.to_string()
}

fn default_secret_key_parameter() -> String {
    DEFAULT_SSM_SECRET_KEY_PARAMETER.to_string()
}

/// Storage driver settings, one variant per provider
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "storage_provider", rename_all = "lowercase")]
pub enum DriverSettings {
    Local(LocalDriverSettings),
    Gcs(GcsDriverSettings),
    S3(S3DriverSettings),
    S3Ssm(S3SsmDriverSettings),
}

impl DriverSettings {
    /// Build driver settings from a provider name and its own fields
    ///
    /// # Errors
    /// Returns an error for an unsupported provider, a missing required
    /// field, or a field belonging to another provider.
    pub fn from_provider(
        provider: &str,
        mut fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self> {
        fields.insert(
            "storage_provider".to_string(),
            serde_json::Value::String(provider.to_string()),
        );
        let settings: DriverSettings = serde_json::from_value(serde_json::Value::Object(fields))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn provider(&self) -> StorageProvider {
        match self {
            DriverSettings::Local(_) => StorageProvider::Local,
            DriverSettings::Gcs(_) => StorageProvider::Gcs,
            DriverSettings::S3(_) => StorageProvider::S3,
            DriverSettings::S3Ssm(_) => StorageProvider::S3Ssm,
        }
    }

    /// Bucket name, or root directory for the local provider
    pub fn bucket(&self) -> String {
        match self {
            DriverSettings::Local(s) => s.bucket.display().to_string(),
            DriverSettings::Gcs(s) => s.bucket.clone(),
            DriverSettings::S3(s) => s.bucket.clone(),
            DriverSettings::S3Ssm(s) => s.bucket.clone(),
        }
    }

    /// Validate the driver configuration
    pub fn validate(&self) -> Result<()> {
        if self.bucket().is_empty() {
            return Err(AssetsError::InvalidSettings(format!(
                "{} bucket cannot be empty",
                self.provider()
            )));
        }

        match self {
            DriverSettings::Local(_) | DriverSettings::Gcs(_) => Ok(()),
            DriverSettings::S3(s) => {
                validate_endpoint(s.endpoint.as_deref())?;
                if s.access_key_id.is_some() != s.secret_access_key.is_some() {
                    return Err(AssetsError::InvalidSettings(
                        "S3 access_key_id and secret_access_key must be set together".to_string(),
                    ));
                }
                Ok(())
            }
            DriverSettings::S3Ssm(s) => {
                validate_endpoint(s.endpoint.as_deref())?;
                if s.access_key_parameter.is_empty() || s.secret_key_parameter.is_empty() {
                    return Err(AssetsError::InvalidSettings(
                        "SSM parameter names cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn validate_endpoint(endpoint: Option<&str>) -> Result<()> {
    if let Some(ep) = endpoint {
        Url::parse(ep).map_err(|e| {
            AssetsError::InvalidSettings(format!("Invalid S3 endpoint URL `{}`: {}", ep, e))
        })?;
    }
    Ok(())
}

fn default_prefix() -> String {
    DEFAULT_ASSETS_PREFIX.to_string()
}

fn default_timeout_s() -> f64 {
    DEFAULT_TIMEOUT_S
}

/// Driver settings with the provider fields inline or nested under `settings`
fn deserialize_driver<'de, D>(deserializer: D) -> std::result::Result<DriverSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let mut fields = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    match fields.remove("settings") {
        Some(serde_json::Value::Object(nested)) => {
            for (key, value) in nested {
                if fields.contains_key(&key) {
                    return Err(D::Error::custom(format!(
                        "driver field `{}` is set both inline and in `settings`",
                        key
                    )));
                }
                fields.insert(key, value);
            }
        }
        Some(_) => return Err(D::Error::custom("driver `settings` must be a map")),
        None => {}
    }

    DriverSettings::deserialize(serde_json::Value::Object(fields)).map_err(D::Error::custom)
}

/// Remote assets store: a driver plus the key namespace
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteAssetsStoreSettings {
    #[serde(deserialize_with = "deserialize_driver")]
    pub driver: DriverSettings,

    #[serde(default = "default_prefix")]
    pub assetsmanager_prefix: String,

    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
}

impl RemoteAssetsStoreSettings {
    pub fn new(driver: DriverSettings) -> Self {
        Self {
            driver,
            assetsmanager_prefix: default_prefix(),
            timeout_s: default_timeout_s(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.assetsmanager_prefix = prefix.into();
        self
    }

    pub fn with_timeout_s(mut self, timeout_s: f64) -> Self {
        self.timeout_s = timeout_s;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_s)
    }

    pub fn validate(&self) -> Result<()> {
        self.driver.validate()?;

        let prefix = &self.assetsmanager_prefix;
        if prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(AssetsError::InvalidSettings(format!(
                "assetsmanager_prefix `{}` must be non-empty without leading or trailing `/`",
                prefix
            )));
        }
        if !self.timeout_s.is_finite() || self.timeout_s <= 0.0 {
            return Err(AssetsError::InvalidSettings(format!(
                "timeout_s must be positive, got {}",
                self.timeout_s
            )));
        }
        Ok(())
    }
}

/// Top-level assets manager settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetsManagerSettings {
    /// Remote store; `None` means local-only operation
    #[serde(default)]
    pub remote_store: Option<RemoteAssetsStoreSettings>,

    /// Absolute root of the local cache
    pub assets_dir: PathBuf,
}

impl AssetsManagerSettings {
    /// Local-only settings
    pub fn local(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_store: None,
            assets_dir: assets_dir.into(),
        }
    }

    pub fn with_remote_store(mut self, remote_store: RemoteAssetsStoreSettings) -> Self {
        self.remote_store = Some(remote_store);
        self
    }

    /// Deserialize and validate settings from a JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let settings: AssetsManagerSettings = serde_json::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.assets_dir.is_absolute() {
            return Err(AssetsError::InvalidSettings(format!(
                "assets_dir `{}` must be an absolute path",
                self.assets_dir.display()
            )));
        }
        if let Some(remote_store) = &self.remote_store {
            remote_store.validate()?;
        }
        Ok(())
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }
}

/// A parsed `gs://` or `s3://` object URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUri {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl RemoteUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| AssetsError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "gs" | "s3") {
            return Err(invalid("scheme must be gs or s3"));
        }
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| invalid("missing bucket"))?;
        let key = url.path().trim_start_matches('/');
        if key.is_empty() {
            return Err(invalid("missing object name"));
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

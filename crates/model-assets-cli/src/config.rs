//! CLI configuration
//!
//! This module handles hierarchical configuration loading from multiple sources:
//! - Default configuration file
//! - Environment-specific configuration file
//! - Environment variables (`MODEL_ASSETS__*`)
//! - The flat deployment variables (`STORAGE_PROVIDER`, `ASSETS_BUCKET_NAME`,
//!   `ASSETS_PREFIX`, `ASSETS_DIR` or `WORKING_DIR`, `ASSETS_TIMEOUT_S`)

use anyhow::{bail, Context};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use model_assets_core::{
    AssetsManagerSettings, DriverSettings, RemoteAssetsStoreSettings, RemoteUri,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// CLI configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    /// Assets manager settings
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Assets manager configuration, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsConfig {
    /// Local cache root
    pub assets_dir: Option<PathBuf>,

    /// One of local, gcs, s3, s3ssm
    pub storage_provider: Option<String>,

    /// Bucket name, root directory for the local provider, or a
    /// `gs://bucket/prefix` / `s3://bucket/prefix` URI
    pub bucket: Option<String>,

    /// Namespace prepended to object keys
    pub prefix: Option<String>,

    /// Fetch timeout in seconds
    pub timeout_s: Option<f64>,

    /// Provider-specific fields such as `region` or `service_account_path`
    #[serde(default)]
    pub driver: BTreeMap<String, serde_json::Value>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting
    #[serde(default)]
    pub json_format: bool,

    /// Include thread IDs
    #[serde(default)]
    pub include_thread_ids: bool,

    /// Include target module
    #[serde(default = "default_true")]
    pub include_target: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

/// Flat deployment variables and the configuration key each one sets
const FLAT_VARIABLES: &[(&str, &str)] = &[
    ("STORAGE_PROVIDER", "assets.storage_provider"),
    ("ASSETS_BUCKET_NAME", "assets.bucket"),
    ("ASSETS_PREFIX", "assets.prefix"),
    ("WORKING_DIR", "assets.assets_dir"),
    ("ASSETS_DIR", "assets.assets_dir"),
];

/// Apply the flat deployment variables found by `lookup`
///
/// Later entries win, so `ASSETS_DIR` takes precedence over `WORKING_DIR`.
fn apply_flat_variables<F>(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: F,
) -> Result<ConfigBuilder<DefaultState>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (variable, key) in FLAT_VARIABLES {
        if let Some(value) = lookup(variable).filter(|v| !v.is_empty()) {
            builder = builder.set_override(*key, value)?;
        }
    }

    if let Some(value) = lookup("ASSETS_TIMEOUT_S").filter(|v| !v.is_empty()) {
        let timeout_s: f64 = value.parse().map_err(|_| {
            ConfigError::Message(format!("ASSETS_TIMEOUT_S `{}` is not a number", value))
        })?;
        builder = builder.set_override("assets.timeout_s", timeout_s)?;
    }

    Ok(builder)
}

impl CliConfig {
    /// Load configuration from files and environment
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default configuration file (config/default.toml)
    /// 2. Environment-specific file (config/{env}.toml)
    /// 3. Environment variables (MODEL_ASSETS__*)
    /// 4. Flat deployment variables
    pub fn load(config_dir: impl Into<PathBuf>, environment: &str) -> Result<Self, ConfigError> {
        Self::load_with(config_dir, environment, |name| std::env::var(name).ok())
    }

    fn load_with<F>(
        config_dir: impl Into<PathBuf>,
        environment: &str,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_dir = config_dir.into();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            // e.g., MODEL_ASSETS__ASSETS__BUCKET=my-bucket
            .add_source(
                Environment::with_prefix("MODEL_ASSETS")
                    .separator("__")
                    .try_parsing(true),
            );

        apply_flat_variables(builder, lookup)?
            .build()?
            .try_deserialize()
    }
}

impl AssetsConfig {
    /// Turn the loaded values into validated manager settings
    ///
    /// A provider without a bucket means local-only operation. A bucket
    /// without a provider is a GCS bucket, unless given as a URI whose scheme
    /// names the provider. Relative cache directories are resolved against
    /// `cwd`.
    pub fn into_settings(self, cwd: &Path) -> anyhow::Result<AssetsManagerSettings> {
        let assets_dir = match self.assets_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => cwd.join(dir),
            None => bail!("no assets directory configured, set ASSETS_DIR or WORKING_DIR"),
        };
        let mut settings = AssetsManagerSettings::local(assets_dir);

        // `gs://bucket/prefix` names the bucket and the key prefix at once
        let (bucket, uri) = match self.bucket {
            Some(bucket) if bucket.contains("://") => {
                let uri = RemoteUri::parse(bucket.trim_end_matches('/'))
                    .with_context(|| format!("invalid bucket URI `{}`", bucket))?;
                (Some(uri.bucket.clone()), Some(uri))
            }
            other => (other, None),
        };

        let provider = match (self.storage_provider, bucket.as_deref(), &uri) {
            (_, None, _) | (_, Some(""), _) => {
                if !self.driver.is_empty() {
                    warn!("Driver options are ignored without a bucket");
                }
                None
            }
            (Some(provider), Some(_), _) => Some(provider),
            (None, Some(_), Some(uri)) if uri.scheme == "s3" => Some("s3".to_string()),
            (None, Some(_), _) => Some("gcs".to_string()),
        };

        if let (Some(provider), Some(bucket)) = (provider, bucket) {
            let mut fields: serde_json::Map<String, serde_json::Value> =
                self.driver.into_iter().collect();
            fields.insert("bucket".to_string(), serde_json::Value::String(bucket));

            let driver = DriverSettings::from_provider(&provider, fields)
                .with_context(|| format!("invalid `{}` storage settings", provider))?;
            if let Some(uri) = &uri {
                if driver.provider().uri_scheme() != uri.scheme {
                    bail!(
                        "bucket URI `{}` does not match storage provider `{}`",
                        uri,
                        provider
                    );
                }
            }

            let mut store = RemoteAssetsStoreSettings::new(driver);
            if let Some(prefix) = self.prefix.or_else(|| uri.map(|uri| uri.key)) {
                store = store.with_prefix(prefix);
            }
            if let Some(timeout_s) = self.timeout_s {
                store = store.with_timeout_s(timeout_s);
            }
            settings = settings.with_remote_store(store);
        }

        settings.validate().context("invalid assets settings")?;
        Ok(settings)
    }
}

//! Assets manager
//!
//! The manager turns asset specifiers into locations. It resolves "latest"
//! versions against the remote store, names the remote object and the local
//! cache path of the resolved version, and in local-process mode makes sure
//! the bytes are in the cache, fetching each missing version at most once at
//! a time.

use model_assets_core::naming::{name_prefix, parse_object_name, store_prefix};
use model_assets_core::settings::DEFAULT_ASSETS_PREFIX;
use model_assets_core::{
    local_subpath, object_name, select_latest, AssetLocation, AssetSpecifier, AssetVersion,
    AssetsManagerSettings, ResolutionMode, ResolvedPath, DOCKER_ASSETS_ROOT,
};
use model_assets_drivers::{build_driver, StorageDriver};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::dto::FetchInfo;
use crate::error::{ServiceError, ServiceResult};
use crate::inflight::InflightFetches;

/// Append a consumer-validated sub-part to a local path
fn join_sub_part(path: PathBuf, sub_part: Option<&str>) -> PathBuf {
    match sub_part {
        Some(sub_part) => sub_part
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(path, |path, segment| path.join(segment)),
        None => path,
    }
}

/// Resolves asset specifiers and maintains the local cache
pub struct AssetsManager {
    settings: AssetsManagerSettings,
    driver: Option<Arc<dyn StorageDriver>>,
    inflight: InflightFetches<(String, AssetVersion), bool>,
}

impl AssetsManager {
    /// Create a manager from validated settings
    ///
    /// Creates the cache directory and builds the remote driver, if any.
    ///
    /// # Errors
    /// Returns `DriverConfiguration` for invalid settings or an unusable
    /// backend, `DriverIo` if the cache directory cannot be created.
    pub fn new(settings: AssetsManagerSettings) -> ServiceResult<Self> {
        settings.validate()?;
        let driver = settings
            .remote_store
            .as_ref()
            .map(build_driver)
            .transpose()?;
        Self::build(settings, driver)
    }

    /// Create a manager around an already constructed driver
    pub fn with_driver(
        settings: AssetsManagerSettings,
        driver: Arc<dyn StorageDriver>,
    ) -> ServiceResult<Self> {
        settings.validate()?;
        Self::build(settings, Some(driver))
    }

    fn build(
        settings: AssetsManagerSettings,
        driver: Option<Arc<dyn StorageDriver>>,
    ) -> ServiceResult<Self> {
        std::fs::create_dir_all(settings.assets_dir()).map_err(|e| {
            ServiceError::DriverIo(format!(
                "cannot create assets_dir `{}`: {}",
                settings.assets_dir().display(),
                e
            ))
        })?;

        info!(
            assets_dir = %settings.assets_dir().display(),
            provider = driver.as_ref().map(|d| d.provider().as_str()).unwrap_or("none"),
            "Assets manager ready"
        );
        Ok(Self {
            settings,
            driver,
            inflight: InflightFetches::new(),
        })
    }

    /// Root of the local cache
    pub fn assets_dir(&self) -> &Path {
        self.settings.assets_dir()
    }

    pub fn settings(&self) -> &AssetsManagerSettings {
        &self.settings
    }

    /// Whether a remote store is configured
    pub fn has_remote_store(&self) -> bool {
        self.driver.is_some()
    }

    /// Namespace prepended to every object key
    pub fn prefix(&self) -> &str {
        self.settings
            .remote_store
            .as_ref()
            .map(|store| store.assetsmanager_prefix.as_str())
            .unwrap_or(DEFAULT_ASSETS_PREFIX)
    }

    /// Remote object key of an asset version
    pub fn object_name(&self, name: &str, version: &AssetVersion) -> String {
        object_name(self.prefix(), name, version)
    }

    /// Backend URI of an asset version
    ///
    /// # Errors
    /// Returns `DriverConfiguration` when no remote store is configured.
    pub fn remote_uri(&self, name: &str, version: &AssetVersion) -> ServiceResult<String> {
        Ok(self.driver()?.object_uri(&self.object_name(name, version)))
    }

    fn driver(&self) -> ServiceResult<&Arc<dyn StorageDriver>> {
        self.driver.as_ref().ok_or_else(|| {
            ServiceError::DriverConfiguration("no remote store is configured".to_string())
        })
    }

    fn cache_path(&self, name: &str, version: &AssetVersion) -> PathBuf {
        self.assets_dir().join(local_subpath(name, version))
    }

    /// Resolve the version a specifier refers to
    ///
    /// Fully pinned specifiers resolve without I/O. Otherwise the highest
    /// available major is picked (or the requested one), then its highest
    /// minor.
    #[instrument(skip(self, spec), fields(spec = %spec))]
    pub async fn resolve_version(&self, spec: &AssetSpecifier) -> ServiceResult<AssetVersion> {
        if let Some(version) = spec.version() {
            return Ok(version);
        }

        let driver = self.driver.as_ref().ok_or_else(|| {
            ServiceError::VersionResolution(format!(
                "`{}` does not pin a version and no remote store is configured",
                spec
            ))
        })?;

        let versions = driver
            .list_versions(&name_prefix(self.prefix(), spec.name()))
            .await?;
        let version = select_latest(&versions, spec.major_version()).ok_or_else(|| {
            ServiceError::AssetNotFound(format!(
                "no version of `{}` with major {}",
                spec.name(),
                spec.major_version().map(|m| m.to_string()).unwrap_or_default()
            ))
        })?;

        debug!(%version, "Resolved asset version");
        Ok(version)
    }

    /// Resolve a specifier to a location
    ///
    /// - `local-docker`: under the container mount root, nothing is read or
    ///   written locally
    /// - `local-process`: inside the cache, fetched first if missing
    /// - `remote`: the backend URI of the object, nothing is read or written
    ///   locally
    #[instrument(skip(self, spec, mode), fields(spec = %spec, mode = %mode))]
    pub async fn get_local_path(
        &self,
        spec: &AssetSpecifier,
        mode: ResolutionMode,
    ) -> ServiceResult<ResolvedPath> {
        let version = self.resolve_version(spec).await?;

        let location = match mode {
            ResolutionMode::LocalDocker => {
                let path = Path::new(DOCKER_ASSETS_ROOT).join(local_subpath(spec.name(), &version));
                AssetLocation::LocalMount(join_sub_part(path, spec.sub_part()))
            }
            ResolutionMode::LocalProcess => {
                self.ensure_cached(spec.name(), version, false).await?;
                let path = self.cache_path(spec.name(), &version);
                AssetLocation::LocalCache(join_sub_part(path, spec.sub_part()))
            }
            ResolutionMode::Remote => {
                let uri = self.remote_uri(spec.name(), &version)?;
                AssetLocation::Remote(match spec.sub_part() {
                    Some(sub_part) => format!("{}/{}", uri, sub_part),
                    None => uri,
                })
            }
        };

        Ok(ResolvedPath {
            spec: spec.clone(),
            version,
            location,
        })
    }

    /// Fetch an asset into the local cache and report what happened
    ///
    /// With `force_download` a fresh copy replaces the cached one; the cached
    /// copy stays in place when the download fails.
    #[instrument(skip(self, spec), fields(spec = %spec))]
    pub async fn fetch_asset(
        &self,
        spec: &AssetSpecifier,
        force_download: bool,
    ) -> ServiceResult<FetchInfo> {
        let version = self.resolve_version(spec).await?;
        let downloaded = self
            .ensure_cached(spec.name(), version, force_download)
            .await?;

        Ok(FetchInfo {
            spec: spec.clone(),
            version,
            path: join_sub_part(self.cache_path(spec.name(), &version), spec.sub_part()),
            object_name: self
                .has_remote_store()
                .then(|| self.object_name(spec.name(), &version)),
            downloaded,
        })
    }

    /// Every asset of the remote store with its versions
    #[instrument(skip(self))]
    pub async fn list_assets(&self) -> ServiceResult<BTreeMap<String, BTreeSet<AssetVersion>>> {
        let driver = self.driver()?;
        let mut assets: BTreeMap<String, BTreeSet<AssetVersion>> = BTreeMap::new();

        for key in driver.list(&store_prefix(self.prefix())).await? {
            if let Some((name, version)) = parse_object_name(self.prefix(), &key) {
                assets.entry(name).or_default().insert(version);
            }
        }

        debug!(count = assets.len(), "Listed remote assets");
        Ok(assets)
    }

    /// Make sure a version is in the cache, returning whether it was fetched
    async fn ensure_cached(
        &self,
        name: &str,
        version: AssetVersion,
        force_download: bool,
    ) -> ServiceResult<bool> {
        let destination = self.cache_path(name, &version);
        if !force_download && tokio::fs::try_exists(&destination).await? {
            debug!(destination = %destination.display(), "Asset already cached");
            return Ok(false);
        }

        let driver = match &self.driver {
            Some(driver) => Arc::clone(driver),
            None => {
                return Err(ServiceError::AssetNotFound(format!(
                    "`{}:{}` is not in `{}` and no remote store is configured",
                    name,
                    version,
                    self.assets_dir().display()
                )))
            }
        };
        let key = self.object_name(name, &version);

        let fetch = async move {
            if force_download {
                info!(key = %key, destination = %destination.display(), "Refetching asset");
                driver.refetch(&key, &destination).await?;
                return Ok(true);
            }
            if tokio::fs::try_exists(&destination).await? {
                // Another fetch completed since the caller looked
                return Ok(false);
            }

            info!(key = %key, destination = %destination.display(), "Fetching asset");
            driver.fetch(&key, &destination).await?;
            Ok::<bool, ServiceError>(true)
        };

        self.inflight.run((name.to_string(), version), fetch).await
    }
}

//! Resolution modes and resolved asset locations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AssetsError, Result};
use crate::specifier::AssetSpecifier;
use crate::version::AssetVersion;

/// Root under which assets are mounted inside serving containers
pub const DOCKER_ASSETS_ROOT: &str = "/config";

/// How a specifier should be turned into a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    /// Assets are pre-mounted at [`DOCKER_ASSETS_ROOT`]
    LocalDocker,
    /// Assets are cached under the manager's `assets_dir`, fetched on demand
    LocalProcess,
    /// No local materialization, the remote URI is returned
    Remote,
}

impl ResolutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMode::LocalDocker => "local-docker",
            ResolutionMode::LocalProcess => "local-process",
            ResolutionMode::Remote => "remote",
        }
    }

    /// Whether the mode needs the asset bytes on the local disk
    pub fn is_local(&self) -> bool {
        !matches!(self, ResolutionMode::Remote)
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionMode {
    type Err = AssetsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local-docker" => Ok(ResolutionMode::LocalDocker),
            "local-process" => Ok(ResolutionMode::LocalProcess),
            "remote" => Ok(ResolutionMode::Remote),
            _ => Err(AssetsError::InvalidSettings(format!(
                "unknown resolution mode `{}` (expected local-docker, local-process or remote)",
                s
            ))),
        }
    }
}

/// Where a resolved asset lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum AssetLocation {
    /// Inside the manager's local cache
    LocalCache(PathBuf),
    /// Under the fixed container mount root
    LocalMount(PathBuf),
    /// Remote object URI
    Remote(String),
}

impl AssetLocation {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            AssetLocation::LocalCache(path) | AssetLocation::LocalMount(path) => Some(path),
            AssetLocation::Remote(_) => None,
        }
    }
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLocation::LocalCache(path) | AssetLocation::LocalMount(path) => {
                write!(f, "{}", path.display())
            }
            AssetLocation::Remote(uri) => f.write_str(uri),
        }
    }
}

/// Outcome of resolving one specifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    /// The specifier as requested
    pub spec: AssetSpecifier,
    /// The version the specifier resolved to
    pub version: AssetVersion,
    pub location: AssetLocation,
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.location.fmt(f)
    }
}

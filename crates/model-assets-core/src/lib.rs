//! Core domain types for model assets
//!
//! This crate contains the pure parts of asset management: parsing asset
//! specifiers, ordering and selecting versions, naming remote objects and
//! local cache paths, and the validated settings contract shared by the
//! drivers and the assets manager. Nothing here performs I/O.

pub mod error;
pub mod naming;
pub mod settings;
pub mod specifier;
pub mod types;
pub mod version;

// Re-exports for convenience
pub use error::{AssetsError, Result};
pub use naming::{local_subpath, object_name};
pub use settings::{
    AssetsManagerSettings, DriverSettings, GcsDriverSettings, LocalDriverSettings,
    RemoteAssetsStoreSettings, RemoteUri, S3DriverSettings, S3SsmDriverSettings, StorageProvider,
};
pub use specifier::AssetSpecifier;
pub use types::{AssetLocation, ResolutionMode, ResolvedPath, DOCKER_ASSETS_ROOT};
pub use version::{select_latest, AssetVersion};

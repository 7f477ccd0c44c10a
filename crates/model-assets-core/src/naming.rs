//! Object naming
//!
//! Maps asset names and resolved versions to remote object keys and local
//! cache sub-paths:
//!
//! ```text
//! remote: <prefix>/<name>/<major>.<minor>
//! local:  <assets_dir>/<name>/<major>.<minor>
//! ```

use std::path::PathBuf;

use crate::version::AssetVersion;

/// Remote object key of an asset version
pub fn object_name(prefix: &str, name: &str, version: &AssetVersion) -> String {
    format!("{}/{}/{}", prefix, name, version)
}

/// Key prefix under which every version of `name` lives
pub fn name_prefix(prefix: &str, name: &str) -> String {
    format!("{}/{}/", prefix, name)
}

/// Prefix under which every asset of the store lives
pub fn store_prefix(prefix: &str) -> String {
    format!("{}/", prefix)
}

/// Cache sub-path of an asset version, relative to the cache root
pub fn local_subpath(name: &str, version: &AssetVersion) -> PathBuf {
    let mut path: PathBuf = name.split('/').collect();
    path.push(version.to_string());
    path
}

/// Version directory named by the first segment of `key` below `name_prefix`
///
/// `key` may be the version object itself (`<prefix>/<name>/1.2`) or any
/// object inside a multi-file version (`<prefix>/<name>/1.2/weights.bin`).
/// Keys whose first segment is not a version, such as objects of a nested
/// asset `<name>/other/1.0`, yield `None`.
pub fn version_from_key(name_prefix: &str, key: &str) -> Option<AssetVersion> {
    let rest = key.strip_prefix(name_prefix)?;
    let segment = rest.split('/').next()?;
    segment.parse().ok()
}

/// Recover the asset name and version from any key of the store
///
/// The name is every segment before the first segment that parses as a
/// version.
pub fn parse_object_name(prefix: &str, key: &str) -> Option<(String, AssetVersion)> {
    let rest = key.strip_prefix(&store_prefix(prefix))?;
    let segments: Vec<&str> = rest.split('/').collect();

    segments
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(i, segment)| {
            segment
                .parse::<AssetVersion>()
                .ok()
                .map(|version| (segments[..i].join("/"), version))
        })
}

//! Major/minor asset versions
//!
//! Asset versions are `(major, minor)` pairs rendered as `<major>.<minor>`.
//! They order numerically, major first, so `1.10` sorts after `1.9`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AssetsError, Result};

/// A fully resolved asset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetVersion {
    pub major: u32,
    pub minor: u32,
}

impl AssetVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for AssetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for AssetVersion {
    type Err = AssetsError;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| AssetsError::InvalidVersion(format!("`{}` is not <major>.<minor>", s)))?;

        Ok(Self {
            major: parse_component(major)
                .ok_or_else(|| AssetsError::InvalidVersion(format!("bad major in `{}`", s)))?,
            minor: parse_component(minor)
                .ok_or_else(|| AssetsError::InvalidVersion(format!("bad minor in `{}`", s)))?,
        })
    }
}

/// Parse one canonical decimal version component.
///
/// Leading zeros are rejected so that every component has exactly one
/// textual form.
pub fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Select the version to use among the available ones.
///
/// Picks the highest major (or the requested one), then the highest minor
/// within it. Returns `None` when nothing matches.
pub fn select_latest(versions: &BTreeSet<AssetVersion>, major: Option<u32>) -> Option<AssetVersion> {
    match major {
        Some(major) => versions.iter().rev().find(|v| v.major == major).copied(),
        None => versions.iter().next_back().copied(),
    }
}

//! Asset specifiers
//!
//! An asset specifier is the compact string clients use to refer to an asset:
//!
//! ```text
//! <name>[:<major>[.<minor>]][[<sub_part>]]
//! ```
//!
//! For example `category/model:1.2[weights/model.bin]` names the file
//! `weights/model.bin` inside version `1.2` of the asset `category/model`,
//! while `category/model:1` asks for the latest minor of major `1` and
//! `category/model` for the latest version overall.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AssetsError, Result};
use crate::version::{parse_component, AssetVersion};

static NAME_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_\-\.]*$").expect("valid regex"));

static SUB_PART_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-\.]+$").expect("valid regex"));

/// Parsed asset specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetSpecifier {
    name: String,
    major_version: Option<u32>,
    minor_version: Option<u32>,
    sub_part: Option<String>,
}

impl AssetSpecifier {
    /// Create a specifier from its parts
    ///
    /// # Errors
    /// Returns `InvalidSpecifier` if the name or sub-part is malformed, or if a
    /// minor version is given without a major version.
    pub fn new(
        name: impl Into<String>,
        major_version: Option<u32>,
        minor_version: Option<u32>,
        sub_part: Option<String>,
    ) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            major_version,
            minor_version,
            sub_part,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a specifier string
    pub fn parse(text: &str) -> Result<Self> {
        let (head, sub_part) = match text.find('[') {
            Some(open) => {
                let inner = text[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| AssetsError::specifier(text, "unterminated sub-part"))?;
                if inner.contains(['[', ']']) {
                    return Err(AssetsError::specifier(text, "nested brackets in sub-part"));
                }
                (&text[..open], Some(inner.to_string()))
            }
            None if text.contains(']') => {
                return Err(AssetsError::specifier(text, "unmatched `]`"));
            }
            None => (text, None),
        };

        let (name, version) = match head.split_once(':') {
            Some((name, version)) => (name, Some(version)),
            None => (head, None),
        };

        let (major_version, minor_version) = match version {
            None => (None, None),
            Some(version) => {
                let (major, minor) = match version.split_once('.') {
                    Some((major, minor)) => (major, Some(minor)),
                    None => (version, None),
                };
                if major.is_empty() && minor.is_some() {
                    return Err(AssetsError::specifier(
                        text,
                        "minor version given without a major version",
                    ));
                }
                let major = parse_component(major).ok_or_else(|| {
                    AssetsError::specifier(text, format!("major version `{}` is not a number", major))
                })?;
                let minor = minor
                    .map(|minor| {
                        parse_component(minor).ok_or_else(|| {
                            AssetsError::specifier(
                                text,
                                format!("minor version `{}` is not a number", minor),
                            )
                        })
                    })
                    .transpose()?;
                (Some(major), minor)
            }
        };

        let spec = Self {
            name: name.to_string(),
            major_version,
            minor_version,
            sub_part,
        };
        spec.validate()
            .map_err(|e| match e {
                AssetsError::InvalidSpecifier { reason, .. } => AssetsError::specifier(text, reason),
                other => other,
            })?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        let shown = self.to_string();

        if self.name.is_empty() {
            return Err(AssetsError::specifier(&shown, "asset name is empty"));
        }
        if let Some(segment) = self.name.split('/').find(|s| !NAME_SEGMENT.is_match(s)) {
            return Err(AssetsError::specifier(
                &shown,
                format!("invalid name segment `{}`", segment),
            ));
        }
        if self.minor_version.is_some() && self.major_version.is_none() {
            return Err(AssetsError::specifier(
                &shown,
                "minor version given without a major version",
            ));
        }
        if let Some(sub_part) = &self.sub_part {
            if sub_part.is_empty() {
                return Err(AssetsError::specifier(&shown, "sub-part is empty"));
            }
            let bad_segment = sub_part
                .split('/')
                .find(|s| !SUB_PART_SEGMENT.is_match(s) || *s == "." || *s == "..");
            if let Some(segment) = bad_segment {
                return Err(AssetsError::specifier(
                    &shown,
                    format!("invalid sub-part segment `{}`", segment),
                ));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn major_version(&self) -> Option<u32> {
        self.major_version
    }

    pub fn minor_version(&self) -> Option<u32> {
        self.minor_version
    }

    pub fn sub_part(&self) -> Option<&str> {
        self.sub_part.as_deref()
    }

    /// The fully specified version, if both components are set
    pub fn version(&self) -> Option<AssetVersion> {
        match (self.major_version, self.minor_version) {
            (Some(major), Some(minor)) => Some(AssetVersion::new(major, minor)),
            _ => None,
        }
    }

    /// Same asset and sub-part, pinned to `version`
    pub fn with_version(&self, version: AssetVersion) -> Self {
        Self {
            name: self.name.clone(),
            major_version: Some(version.major),
            minor_version: Some(version.minor),
            sub_part: self.sub_part.clone(),
        }
    }
}

impl fmt::Display for AssetSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(major) = self.major_version {
            write!(f, ":{}", major)?;
        }
        if let Some(minor) = self.minor_version {
            write!(f, ".{}", minor)?;
        }
        if let Some(sub_part) = &self.sub_part {
            write!(f, "[{}]", sub_part)?;
        }
        Ok(())
    }
}

impl FromStr for AssetSpecifier {
    type Err = AssetsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssetSpecifier {
    type Error = AssetsError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AssetSpecifier> for String {
    fn from(spec: AssetSpecifier) -> Self {
        spec.to_string()
    }
}

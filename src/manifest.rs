//! Package manifest (`Cargo.toml`) reading
//!
//! Only the handful of fields the operations need are extracted: name,
//! version, publish eligibility, features, the docs.rs default target and the
//! names of declared dependencies.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

pub const MANIFEST_FILE: &str = "Cargo.toml";

/// Features that are never device selectors
const NON_DEVICE_FEATURES: &[&str] = &["default", "rt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    /// Declared version text, if any; not yet validated
    pub version: Option<String>,
    pub publish: bool,
    pub features: BTreeMap<String, Vec<String>>,
    pub default_target: Option<String>,
    /// Names of `[dependencies]` and `[build-dependencies]` (after `package` renames)
    pub dependencies: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawManifest {
    package: Option<RawPackage>,
    #[serde(default)]
    features: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
    #[serde(default, rename = "build-dependencies")]
    build_dependencies: BTreeMap<String, RawDependency>,
}

#[derive(Deserialize)]
struct RawPackage {
    name: String,
    version: Option<toml::Value>,
    publish: Option<toml::Value>,
    metadata: Option<toml::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Version(String),
    Detailed(toml::Table),
}

impl RawDependency {
    fn package_name<'a>(&'a self, key: &'a str) -> &'a str {
        match self {
            RawDependency::Version(_) => key,
            RawDependency::Detailed(table) => table
                .get("package")
                .and_then(toml::Value::as_str)
                .unwrap_or(key),
        }
    }
}

impl PackageManifest {
    /// Read the manifest in `dir`
    ///
    /// Returns `Ok(None)` for manifests without a `[package]` table
    /// (virtual workspace manifests).
    pub fn read(dir: &Path) -> Result<Option<Self>, String> {
        let path = dir.join(MANIFEST_FILE);
        let content =
            fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))?;
        Self::parse(&content).map_err(|e| format!("{}: {e}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Option<Self>, String> {
        let raw: RawManifest = toml::from_str(content).map_err(|e| e.message().to_string())?;
        let Some(package) = raw.package else {
            return Ok(None);
        };

        let version = package.version.map(|v| match v {
            toml::Value::String(s) => s,
            other => other.to_string(),
        });

        let publish = match package.publish {
            None => true,
            Some(toml::Value::Boolean(publish)) => publish,
            Some(toml::Value::Array(registries)) => !registries.is_empty(),
            Some(_) => true,
        };

        let default_target = package
            .metadata
            .as_ref()
            .and_then(|m| m.get("docs"))
            .and_then(|d| d.get("rs"))
            .and_then(|r| r.get("default-target"))
            .and_then(toml::Value::as_str)
            .map(str::to_string);

        let dependencies = raw
            .dependencies
            .iter()
            .chain(raw.build_dependencies.iter())
            .map(|(key, dep)| dep.package_name(key).to_string())
            .collect();

        Ok(Some(Self {
            name: package.name,
            version,
            publish,
            features: raw.features,
            default_target,
            dependencies,
        }))
    }

    /// Device selector features: features that activate nothing else
    pub fn device_features(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|(name, activates)| {
                activates.is_empty() && !NON_DEVICE_FEATURES.contains(&name.as_str())
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains_key(feature)
    }
}

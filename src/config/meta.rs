//! `mcu.toml` family metadata
//!
//! ```toml
//! [efm32gg]
//! name = "EFM32 Giant Gecko"
//! repository = "https://github.com/efm32-rs/efm32gg-pacs"
//! version = "0.2.0"
//! license = "BSD-3-Clause"      # optional, this is the default
//! authors = ["Jane Doe <jane@example.com>"]   # optional
//!
//! [efm32gg.target.arch]
//! efm32gg11b = "thumbv7em-none-eabihf"
//! ```
//!
//! A package family (e.g. `efm32gg11b`) belongs to the series whose key is the
//! longest prefix of the family name (`efm32gg`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PacsError, Result};

pub const META_FILE: &str = "mcu.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeriesMeta {
    /// Human readable series name
    pub name: String,
    pub repository: String,
    /// Version written into every generated package of the series
    pub version: String,
    #[serde(default = "default_license")]
    pub license: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub target: TargetMeta,
}

fn default_license() -> String {
    "BSD-3-Clause".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TargetMeta {
    /// Target triple per package family
    #[serde(default)]
    pub arch: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct McuMeta {
    path: PathBuf,
    series: BTreeMap<String, SeriesMeta>,
}

/// Metadata resolved for one package family
#[derive(Debug, Clone, Copy)]
pub struct FamilyMeta<'a> {
    pub series_key: &'a str,
    pub series: &'a SeriesMeta,
    pub arch: Option<&'a str>,
}

impl McuMeta {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PacsError::MetaNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let series: BTreeMap<String, SeriesMeta> =
            toml::from_str(content).map_err(|e| PacsError::MetaParseFailed {
                path: path.display().to_string(),
                reason: e.message().to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            series,
        })
    }

    /// Resolve the metadata file for a run
    ///
    /// An explicit path must exist. Without one, `mcu.toml` in `cwd` is used
    /// when present.
    pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Result<Option<Self>> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None => {
                let implicit = cwd.join(META_FILE);
                if implicit.is_file() {
                    Self::load(&implicit).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn family(&self, family: &str) -> Option<FamilyMeta<'_>> {
        let (series_key, series) = self
            .series
            .iter()
            .filter(|(key, _)| family.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())?;
        Some(FamilyMeta {
            series_key,
            series,
            arch: series.target.arch.get(family).map(String::as_str),
        })
    }
}

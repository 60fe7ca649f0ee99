//! Run configuration
//!
//! This module contains:
//! - [`RunConfig`] - per-invocation settings built from global CLI flags
//! - [`Toolchain`] - names of the external programs, overridable from the environment
//! - [`meta`] - the `mcu.toml` family metadata file

pub mod meta;

use std::time::Duration;

pub use meta::{FamilyMeta, McuMeta};

/// Default bound for a single external command
pub const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;

/// Settings shared by every operation of a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub timeout: Duration,
    pub jobs: usize,
    pub toolchain: Toolchain,
}

impl RunConfig {
    pub fn new(timeout_secs: u64, jobs: usize) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            jobs: jobs.max(1),
            toolchain: Toolchain::from_env(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            jobs: 1,
            toolchain: Toolchain::default(),
        }
    }
}

/// External programs used by the operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub svd2rust: String,
    pub form: String,
    pub rustfmt: String,
    pub svdtools: String,
    pub cargo: String,
    pub git: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            svd2rust: "svd2rust".to_string(),
            form: "form".to_string(),
            rustfmt: "rustfmt".to_string(),
            svdtools: "svdtools".to_string(),
            cargo: "cargo".to_string(),
            git: "git".to_string(),
        }
    }
}

impl Toolchain {
    /// Read `PACS_TOOLS_<TOOL>` overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |key: &str, default: String| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            svd2rust: pick("PACS_TOOLS_SVD2RUST", defaults.svd2rust),
            form: pick("PACS_TOOLS_FORM", defaults.form),
            rustfmt: pick("PACS_TOOLS_RUSTFMT", defaults.rustfmt),
            svdtools: pick("PACS_TOOLS_SVDTOOLS", defaults.svdtools),
            cargo: pick("PACS_TOOLS_CARGO", defaults.cargo),
            git: pick("PACS_TOOLS_GIT", defaults.git),
        }
    }
}

//! Markdown table of published packages, for repository READMEs

use std::fmt::Write as _;
use std::path::Path;

use tracing::warn;

use crate::discovery::{PackageTarget, find_packages};
use crate::error::Result;

const HEADER: &str = "| Crate | Docs | crates.io | target |\n|-------|------|-----------|--------|\n";

/// Table row per package below `dir`, in directory order
///
/// The target column shows `arch` when given, else the package's docs.rs
/// default target.
pub fn generate(dir: &Path, arch: Option<&str>) -> Result<String> {
    let packages = find_packages(dir)?;
    Ok(render(&packages, arch))
}

pub fn render(packages: &[PackageTarget], arch: Option<&str>) -> String {
    let mut out = String::from(HEADER);
    for package in packages {
        let manifest = match package.manifest() {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let name = &manifest.name;
        let target = arch
            .or(manifest.default_target.as_deref())
            .map_or_else(|| "-".to_string(), |t| format!("`{t}`"));
        let _ = writeln!(
            out,
            "| `{name}` \
             | [![docs.rs](https://docs.rs/{name}/badge.svg)](https://docs.rs/{name}) \
             | [![crates.io](https://img.shields.io/crates/d/{name}.svg)](https://crates.io/crates/{name}) \
             | {target} |"
        );
    }
    out
}

//! Family package skeleton
//!
//! Rewrites everything around the generated device modules of one family:
//! `Cargo.toml`, `src/lib.rs`, `build.rs`, `README.md` and, for targets
//! without atomic compare-and-swap, `.cargo/config.toml`. The device list is
//! whatever module directories are present in `src/`, so packages built up
//! over several runs keep all their devices.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{FamilyMeta, RunConfig};
use crate::tool::{Invocation, StepFailure, ToolInvoker};

/// Target without atomic CAS; needs `portable-atomic` help
const NO_ATOMIC_CAS_TARGET: &str = "thumbv6m-none-eabi";
const SINGLE_CORE_CFG: &str = "--cfg=portable_atomic_unsafe_assume_single_core";

const DEVICE_SELECTION_MARKER: &str = "__DEVICE_SELECTION__";

const BUILD_RS_TEMPLATE: &str = r#"use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    if env::var_os("CARGO_FEATURE_RT").is_some() {
        let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
        println!("cargo:rustc-link-search={}", out.display());

        let device_file = __DEVICE_SELECTION__ else {
            panic!("No device features selected");
        };

        fs::copy(device_file, out.join("device.x")).expect("failed to copy device.x");
        println!("cargo:rerun-if-changed={}", device_file);
    }

    println!("cargo:rerun-if-changed=build.rs");
}
"#;

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("no device modules in {0}")]
    NoDevices(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to render Cargo.toml: {0}")]
    Manifest(#[from] toml::ser::Error),

    #[error("rustfmt failed on {file}: {reason}")]
    Format { file: String, reason: String },
}

impl ScaffoldError {
    fn io(path: &Path, source: io::Error) -> Self {
        ScaffoldError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Version of the SVD compiler, e.g. `0.33.5`
///
/// `None` if the tool cannot be queried; generated docs then link to the
/// latest release.
pub fn generator_version(invoker: &dyn ToolInvoker, config: &RunConfig) -> Option<String> {
    let invocation =
        Invocation::new(&config.toolchain.svd2rust, config.timeout).arg("--version");
    match invoker.run_step(&invocation) {
        Ok(output) => parse_version(&output.stdout),
        Err(e) => {
            warn!("could not query svd2rust version: {:?}", e);
            None
        }
    }
}

/// `svd2rust 0.33.5 (abc 2024-01-01)` -> `0.33.5`
fn parse_version(output: &str) -> Option<String> {
    let mut words = output.split_whitespace();
    let first = words.next()?;
    Some(words.next().unwrap_or(first).to_string())
}

/// Rewrite the package skeleton in `package_dir`
///
/// Returns the devices the package now supports.
pub fn write_package(
    invoker: &dyn ToolInvoker,
    config: &RunConfig,
    package_dir: &Path,
    family: &str,
    meta: &FamilyMeta<'_>,
    generator_version: Option<&str>,
) -> Result<Vec<String>, ScaffoldError> {
    let src = package_dir.join("src");
    let devices = device_modules(&src)?;
    if devices.is_empty() {
        return Err(ScaffoldError::NoDevices(src.display().to_string()));
    }
    if meta.arch.is_none() {
        warn!(
            "{}: no target.arch entry in metadata, docs.rs will use its default target",
            family
        );
    }

    write(&package_dir.join("Cargo.toml"), &cargo_manifest(family, &devices, meta)?)?;

    let lib_rs = src.join("lib.rs");
    write(&lib_rs, &lib_rs_source(family, &devices, meta, generator_version))?;
    format(invoker, config, package_dir, &lib_rs)?;

    let build_rs = package_dir.join("build.rs");
    write(&build_rs, &build_rs_source(&devices))?;
    format(invoker, config, package_dir, &build_rs)?;

    write(
        &package_dir.join("README.md"),
        &readme(family, &devices, meta, generator_version),
    )?;

    if meta.arch == Some(NO_ATOMIC_CAS_TARGET) {
        write(
            &package_dir.join(".cargo").join("config.toml"),
            &no_atomic_cas_config()?,
        )?;
    }

    debug!("{}: devices {:?}", family, devices);
    Ok(devices)
}

/// Module directories in `src/`, sorted
fn device_modules(src: &Path) -> Result<Vec<String>, ScaffoldError> {
    let mut devices = Vec::new();
    for entry in fs::read_dir(src).map_err(|e| ScaffoldError::io(src, e))? {
        let entry = entry.map_err(|e| ScaffoldError::io(src, e))?;
        let path = entry.path();
        if path.is_dir() && path.join("mod.rs").is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                devices.push(name.to_string());
            }
        }
    }
    devices.sort();
    Ok(devices)
}

fn write(path: &Path, content: &str) -> Result<(), ScaffoldError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScaffoldError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| ScaffoldError::io(path, e))
}

fn format(
    invoker: &dyn ToolInvoker,
    config: &RunConfig,
    package_dir: &Path,
    file: &Path,
) -> Result<(), ScaffoldError> {
    let invocation = Invocation::new(&config.toolchain.rustfmt, config.timeout)
        .path_arg(file)
        .cwd(package_dir);
    invoker
        .run_step(&invocation)
        .map(|_| ())
        .map_err(|failure| ScaffoldError::Format {
            file: file.display().to_string(),
            reason: match failure {
                StepFailure::Cancelled => "cancelled".to_string(),
                StepFailure::Failed { diagnostics, .. } => diagnostics,
            },
        })
}

#[derive(Serialize)]
struct CargoManifest<'a> {
    package: Package<'a>,
    dependencies: BTreeMap<&'static str, Dependency>,
    features: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
struct Package<'a> {
    name: String,
    description: String,
    homepage: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    authors: &'a [String],
    license: &'a str,
    keywords: Vec<&'a str>,
    categories: [&'static str; 3],
    repository: &'a str,
    readme: &'static str,
    edition: &'static str,
    metadata: PackageMetadata<'a>,
}

#[derive(Serialize)]
struct PackageMetadata<'a> {
    docs: DocsMetadata<'a>,
}

#[derive(Serialize)]
struct DocsMetadata<'a> {
    rs: DocsRs<'a>,
}

#[derive(Serialize)]
struct DocsRs<'a> {
    features: Vec<&'a str>,
    #[serde(rename = "default-target", skip_serializing_if = "Option::is_none")]
    default_target: Option<&'a str>,
    targets: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Dependency {
    Version(&'static str),
    Detailed {
        version: &'static str,
        #[serde(rename = "default-features", skip_serializing_if = "Option::is_none")]
        default_features: Option<bool>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
    },
}

fn cargo_manifest(
    family: &str,
    devices: &[String],
    meta: &FamilyMeta<'_>,
) -> Result<String, ScaffoldError> {
    let series = meta.series;

    let mut docs_features = vec!["rt"];
    if let Some(first) = devices.first() {
        docs_features.push(first);
    }
    if devices.len() > 1 {
        if let Some(last) = devices.last() {
            docs_features.push(last);
        }
    }

    let dependencies = BTreeMap::from([
        ("cortex-m", Dependency::Version("~0.7")),
        ("vcell", Dependency::Version("~0.1")),
        (
            "portable-atomic",
            Dependency::Detailed {
                version: "~1",
                default_features: Some(false),
                optional: false,
            },
        ),
        (
            "critical-section",
            Dependency::Detailed {
                version: "~1",
                default_features: None,
                optional: true,
            },
        ),
        (
            "cortex-m-rt",
            Dependency::Detailed {
                version: "~0.7",
                default_features: None,
                optional: true,
            },
        ),
    ]);

    let mut critical_section = vec!["dep:critical-section".to_string()];
    if meta.arch == Some(NO_ATOMIC_CAS_TARGET) {
        critical_section.push("portable-atomic/critical-section".to_string());
    }
    let mut features = BTreeMap::from([
        ("default".to_string(), vec!["rt".to_string()]),
        ("rt".to_string(), vec!["cortex-m-rt/device".to_string()]),
        ("critical-section".to_string(), critical_section),
    ]);
    features.extend(devices.iter().map(|device| (device.clone(), Vec::new())));

    let manifest = CargoManifest {
        package: Package {
            name: format!("{family}-pac"),
            description: format!(
                "Peripheral access API for {} MCU (generated using svd2rust)",
                family.to_uppercase()
            ),
            homepage: &series.repository,
            version: &series.version,
            authors: &series.authors,
            license: &series.license,
            keywords: vec!["no-std", "arm", "cortex-m", meta.series_key],
            categories: ["embedded", "hardware-support", "no-std"],
            repository: &series.repository,
            readme: "README.md",
            edition: "2021",
            metadata: PackageMetadata {
                docs: DocsMetadata {
                    rs: DocsRs {
                        features: docs_features,
                        default_target: meta.arch,
                        targets: Vec::new(),
                    },
                },
            },
        },
        dependencies,
        features,
    };

    Ok(toml::to_string(&manifest)?)
}

fn docs_version(generator_version: Option<&str>) -> &str {
    generator_version.unwrap_or("latest")
}

fn lib_rs_source(
    family: &str,
    devices: &[String],
    meta: &FamilyMeta<'_>,
    generator_version: Option<&str>,
) -> String {
    let upper = family.to_uppercase();
    let repository = &meta.series.repository;
    let mut out = String::new();

    let _ = writeln!(out, "//! Peripheral access API for {upper} microcontrollers");
    match generator_version {
        Some(version) => {
            let _ = writeln!(
                out,
                "//! (generated using [svd2rust](https://github.com/rust-embedded/svd2rust) {version})"
            );
        }
        None => {
            let _ = writeln!(
                out,
                "//! (generated using [svd2rust](https://github.com/rust-embedded/svd2rust))"
            );
        }
    }
    let _ = writeln!(out, "//!");
    let _ = writeln!(out, "//! You can find an overview of the API here:");
    let _ = writeln!(
        out,
        "//! [svd2rust/#peripheral-api](https://docs.rs/svd2rust/{}/svd2rust/#peripheral-api)",
        docs_version(generator_version)
    );
    let _ = writeln!(out, "//!");
    let _ = writeln!(out, "//! For more details see the README here:");
    let _ = writeln!(out, "//! [{}]({repository})", meta.series.name);
    let _ = writeln!(out, "//!");
    let _ = writeln!(
        out,
        "//! This crate supports all {upper} devices; for the complete list please see:"
    );
    let _ = writeln!(out, "//! [{family}]({repository}/tree/master/pacs/{family})");
    out.push_str(
        "\n#![allow(non_camel_case_types)]\n#![allow(non_snake_case)]\n#![no_std]\n\nmod generic;\npub use self::generic::*;\n",
    );
    for device in devices {
        let _ = write!(out, "\n#[cfg(feature = \"{device}\")]\npub mod {device};\n");
    }
    out
}

fn build_rs_source(devices: &[String]) -> String {
    let mut selection = String::new();
    for (i, device) in devices.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "} else if" };
        let _ = write!(
            selection,
            "{keyword} env::var_os(\"CARGO_FEATURE_{}\").is_some() {{\n    \"src/{device}/device.x\"\n",
            feature_env(device)
        );
    }
    selection.push('}');
    BUILD_RS_TEMPLATE.replace(DEVICE_SELECTION_MARKER, &selection)
}

/// Name of the `CARGO_FEATURE_*` variable cargo sets for `feature`
fn feature_env(feature: &str) -> String {
    feature.to_uppercase().replace('-', "_")
}

fn readme(
    family: &str,
    devices: &[String],
    meta: &FamilyMeta<'_>,
    generator_version: Option<&str>,
) -> String {
    let upper = family.to_uppercase();
    let crate_name = format!("{family}-pac");
    let first_device = devices.first().map(String::as_str).unwrap_or_default();
    let mut out = String::new();

    let _ = writeln!(out, "# {upper}\n");
    let _ = writeln!(
        out,
        "[![crates.io](https://img.shields.io/crates/v/{crate_name}?label={family})](https://crates.io/crates/{crate_name})\n"
    );
    let _ = writeln!(
        out,
        "This crate provides an autogenerated API for access to {upper} peripherals.\n"
    );
    let _ = writeln!(out, "## Usage\n");
    let _ = writeln!(
        out,
        "Each device supported by this crate is behind a feature gate so that you only\ncompile the device(s) you want. To use, in your Cargo.toml:\n"
    );
    let _ = writeln!(
        out,
        "```toml\n[dependencies.{crate_name}]\nversion = \"{}\"\nfeatures = [\"{first_device}\"]\n```\n",
        meta.series.version
    );
    let _ = writeln!(
        out,
        "The `rt` feature is enabled by default and brings in support for `cortex-m-rt`.\nTo disable, specify `default-features = false` in `Cargo.toml`.\n"
    );
    let _ = writeln!(
        out,
        "For full details on the autogenerated API, please see `svd2rust` Peripheral API [here].\n"
    );
    let _ = writeln!(
        out,
        "[here]: https://docs.rs/svd2rust/{}/svd2rust/#peripheral-api\n",
        docs_version(generator_version)
    );
    let _ = writeln!(out, "## Supported Devices\n");
    let _ = writeln!(out, "| Feature | Device |\n|:-------:|:------:|");
    for device in devices {
        let _ = writeln!(out, "| `{device}` | {} |", device.to_uppercase());
    }
    out
}

#[derive(Serialize)]
struct CargoConfig {
    build: BuildConfig,
}

#[derive(Serialize)]
struct BuildConfig {
    rustflags: Vec<&'static str>,
}

fn no_atomic_cas_config() -> Result<String, ScaffoldError> {
    Ok(toml::to_string(&CargoConfig {
        build: BuildConfig {
            rustflags: vec![SINGLE_CORE_CFG],
        },
    })?)
}

//! `pacs-gen`: device module generation
//!
//! Every descriptor is generated in its own scratch directory:
//!
//! 1. optionally patch the SVD with `svdtools` ([`patch`])
//! 2. `svd2rust -m -g --atomics` renders one `mod.rs`, `generic.rs` and `device.x`
//! 3. `form` splits `mod.rs` into a module tree under `src/`
//! 4. the module tree replaces `<out>/<family>/src/<name>/`
//! 5. `rustfmt` formats the module
//!
//! Once all descriptors are done, family packages are scaffolded from the
//! family metadata ([`scaffold`]).

pub mod patch;
pub mod scaffold;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::common::fs::{move_path, recreate_dir};
use crate::config::meta::META_FILE;
use crate::config::{McuMeta, RunConfig};
use crate::discovery::{DescriptorSource, DeviceDescriptor};
use crate::error::{PacsError, Result, TargetError};
use crate::orchestrator::{OperationResult, Outcome, Report, RunContext};
use crate::temp;
use crate::tool::{Invocation, StepFailure, ToolInvoker, ToolOutput};

pub const OPERATION: &str = "pacs-gen";

const SVD2RUST: &str = "svd2rust";
const FORM: &str = "form";
const RUSTFMT: &str = "rustfmt";
const SVDTOOLS: &str = "svdtools";

const GENERIC_FILE: &str = "generic.rs";
const DEVICE_FILE: &str = "device.x";
const MODULE_FILE: &str = "mod.rs";
const SPLIT_DIR: &str = "src";
const SPLIT_ROOT: &str = "lib.rs";

/// Inputs of a `pacs-gen` run
#[derive(Debug)]
pub struct GenerateRequest {
    pub svd_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Family metadata; scaffolding is skipped without it
    pub meta: Option<McuMeta>,
}

/// Output directory used when none is given: `pacs/` next to the SVD directory
pub fn default_out_dir(svd_dir: &Path) -> PathBuf {
    let svd_dir = dunce::canonicalize(svd_dir).unwrap_or_else(|_| svd_dir.to_path_buf());
    svd_dir
        .parent()
        .map(|parent| parent.join("pacs"))
        .unwrap_or_else(|| svd_dir.join("pacs"))
}

/// Generate every descriptor below `request.svd_dir`
pub fn run(ctx: &RunContext<'_>, request: &GenerateRequest) -> Result<Report> {
    let source = DescriptorSource::open(&request.svd_dir)?;
    let descriptors = source.collect()?;
    if descriptors.is_empty() {
        let empty = PacsError::EmptyInput {
            path: source.root().display().to_string(),
        };
        warn!("{}", empty);
        return Ok(Report::empty(OPERATION));
    }

    fs::create_dir_all(&request.out_dir).map_err(|e| PacsError::IoError {
        message: format!("{}: {e}", request.out_dir.display()),
    })?;
    info!(
        "generating {} device module(s) into {}",
        descriptors.len(),
        request.out_dir.display()
    );

    let generator = Generator::new(ctx.invoker, ctx.config, &request.out_dir);
    let mut results = ctx.batch(OPERATION, &descriptors, ctx.config.jobs, |descriptor| {
        generator.generate(descriptor).into()
    });

    match &request.meta {
        _ if ctx.cancel.is_cancelled() => {}
        Some(meta) => scaffold_families(ctx, meta, &request.out_dir, &descriptors, &mut results),
        None => info!("no {} given, skipping package scaffolding", META_FILE),
    }

    Ok(Report::new(OPERATION, results))
}

/// Write the package skeleton of every family with at least one generated module
///
/// A scaffold failure turns the family's successful results into failures.
fn scaffold_families(
    ctx: &RunContext<'_>,
    meta: &McuMeta,
    out_dir: &Path,
    descriptors: &[DeviceDescriptor],
    results: &mut [OperationResult],
) {
    let mut families: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        families.entry(descriptor.family.as_str()).or_default().push(index);
    }

    let generated = |indices: &[usize]| indices.iter().any(|&i| results[i].outcome.is_success());
    if !families.values().any(|indices| generated(indices)) {
        return;
    }
    let generator_version = scaffold::generator_version(ctx.invoker, ctx.config);

    for (family, indices) in families {
        if !indices.iter().any(|&i| results[i].outcome.is_success()) {
            continue;
        }

        let scaffolded = match meta.family(family) {
            Some(family_meta) => scaffold::write_package(
                ctx.invoker,
                ctx.config,
                &out_dir.join(family),
                family,
                &family_meta,
                generator_version.as_deref(),
            )
            .map_err(|e| e.to_string()),
            None => Err(format!(
                "no series in {} matches family '{}'",
                meta.path().display(),
                family
            )),
        };

        match scaffolded {
            Ok(devices) => info!("{}: scaffolded package with {} device(s)", family, devices.len()),
            Err(reason) => {
                warn!("{}: scaffolding failed: {}", family, reason);
                for &i in &indices {
                    let result = &mut results[i];
                    if result.outcome.is_success() {
                        result.outcome = Outcome::failed(TargetError::Scaffold {
                            target: result.target.clone(),
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }
    }
}

/// Runs the generation pipeline for single descriptors
pub struct Generator<'a> {
    invoker: &'a dyn ToolInvoker,
    config: &'a RunConfig,
    out_dir: PathBuf,
    /// Families whose `generic.rs` was placed during this run
    generic_placed: Mutex<HashSet<String>>,
}

impl<'a> Generator<'a> {
    pub fn new(invoker: &'a dyn ToolInvoker, config: &'a RunConfig, out_dir: &Path) -> Self {
        Self {
            invoker,
            config,
            out_dir: out_dir.to_path_buf(),
            generic_placed: Mutex::new(HashSet::new()),
        }
    }

    /// `<out>/<family>/src/<name>/`
    pub fn module_dir(&self, descriptor: &DeviceDescriptor) -> PathBuf {
        self.family_src(&descriptor.family).join(&descriptor.name)
    }

    fn family_src(&self, family: &str) -> PathBuf {
        self.out_dir.join(family).join("src")
    }

    pub fn generate(&self, descriptor: &DeviceDescriptor) -> std::result::Result<(), TargetError> {
        let target = descriptor.id();
        if let Some(first) = &descriptor.duplicate_of {
            return Err(TargetError::Duplicate {
                target,
                path: descriptor.path.display().to_string(),
                first: first.display().to_string(),
            });
        }
        let io_error = |e: std::io::Error| TargetError::io(&target, &e);

        let scratch_dir = temp::scratch_dir(&descriptor.name).map_err(io_error)?;
        let scratch = scratch_dir.path();
        debug!("{}: scratch directory {}", target, scratch.display());

        let svd = match &descriptor.patch {
            Some(patch) => self.apply_patch(descriptor, patch, scratch)?,
            None => descriptor.path.clone(),
        };

        self.step(
            &target,
            SVD2RUST,
            Invocation::new(&self.config.toolchain.svd2rust, self.config.timeout)
                .args(["-m", "-g", "--atomics", "-i"])
                .path_arg(&svd)
                .arg("-o")
                .path_arg(scratch),
        )?;

        let split_dir = scratch.join(SPLIT_DIR);
        self.step(
            &target,
            FORM,
            Invocation::new(&self.config.toolchain.form, self.config.timeout)
                .arg("-i")
                .path_arg(&scratch.join(MODULE_FILE))
                .arg("-o")
                .path_arg(&split_dir),
        )?;

        let split_root = split_dir.join(SPLIT_ROOT);
        if !split_root.is_file() {
            return Err(missing_output(&target, FORM, &split_root));
        }
        fs::rename(&split_root, split_dir.join(MODULE_FILE)).map_err(io_error)?;

        let module_dir = self.module_dir(descriptor);
        self.place(&target, descriptor, scratch, &split_dir, &module_dir)?;

        self.step(
            &target,
            RUSTFMT,
            Invocation::new(&self.config.toolchain.rustfmt, self.config.timeout)
                .path_arg(&module_dir.join(MODULE_FILE))
                .cwd(&module_dir),
        )?;

        debug!("{}: generated {}", target, module_dir.display());
        Ok(())
    }

    /// Move generator output into the package, replacing the previous module
    fn place(
        &self,
        target: &str,
        descriptor: &DeviceDescriptor,
        scratch: &Path,
        split_dir: &Path,
        module_dir: &Path,
    ) -> std::result::Result<(), TargetError> {
        let io_error = |e: std::io::Error| TargetError::io(target, &e);

        let device_file = scratch.join(DEVICE_FILE);
        if !device_file.is_file() {
            return Err(missing_output(target, SVD2RUST, &device_file));
        }

        recreate_dir(module_dir).map_err(io_error)?;
        move_path(&device_file, &module_dir.join(DEVICE_FILE)).map_err(io_error)?;
        for entry in fs::read_dir(split_dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            move_path(&entry.path(), &module_dir.join(entry.file_name())).map_err(io_error)?;
        }

        self.place_generic(target, &descriptor.family, &scratch.join(GENERIC_FILE))
    }

    /// Put the shared `generic.rs` into the family's `src/`, once per run
    fn place_generic(
        &self,
        target: &str,
        family: &str,
        generic: &Path,
    ) -> std::result::Result<(), TargetError> {
        let mut placed = self
            .generic_placed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if placed.contains(family) {
            return Ok(());
        }
        if !generic.is_file() {
            return Err(missing_output(target, SVD2RUST, generic));
        }
        move_path(generic, &self.family_src(family).join(GENERIC_FILE))
            .map_err(|e| TargetError::io(target, &e))?;
        placed.insert(family.to_string());
        Ok(())
    }

    fn step(
        &self,
        target: &str,
        tool: &str,
        invocation: Invocation,
    ) -> std::result::Result<ToolOutput, TargetError> {
        self.invoker
            .run_step(&invocation)
            .map_err(|failure| match failure {
                StepFailure::Cancelled => TargetError::Cancelled {
                    target: target.to_string(),
                },
                StepFailure::Failed {
                    exit_code,
                    diagnostics,
                } => TargetError::Generation {
                    target: target.to_string(),
                    tool: tool.to_string(),
                    exit_code,
                    stderr: diagnostics,
                },
            })
    }
}

/// A tool exited successfully but did not write what it should have
fn missing_output(target: &str, tool: &str, path: &Path) -> TargetError {
    TargetError::Generation {
        target: target.to_string(),
        tool: tool.to_string(),
        exit_code: Some(0),
        stderr: format!("expected output {} was not produced", path.display()),
    }
}

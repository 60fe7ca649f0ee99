//! `test`: check generated packages
//!
//! Every device feature of a package is checked on its own
//! (`cargo check --features rt,<device>`), followed by `cargo clean` so
//! build output does not pile up across devices. All features are checked
//! even after a failure; the diagnostics of every failing step end up in one
//! `ValidationError`.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::discovery::{PackageTarget, find_packages};
use crate::error::{PacsError, Result, TargetError};
use crate::manifest::PackageManifest;
use crate::orchestrator::{Outcome, Report, RunContext};
use crate::tool::{Invocation, StepFailure, ToolInvoker};

pub const OPERATION: &str = "test";

const RT_FEATURE: &str = "rt";

/// Check every package below `dir`, skipping `exclude`d names
pub fn run(ctx: &RunContext<'_>, dir: &Path, exclude: &[String]) -> Result<Report> {
    let packages = find_packages(dir)?;
    if packages.is_empty() {
        warn!(
            "{}",
            PacsError::EmptyInput {
                path: dir.display().to_string()
            }
        );
        return Ok(Report::empty(OPERATION));
    }
    info!("checking {} package(s)", packages.len());

    let results = ctx.batch(OPERATION, &packages, ctx.config.jobs, |package| {
        if exclude.iter().any(|name| package.matches(name)) {
            return Outcome::skipped("excluded");
        }
        validate(ctx.invoker, ctx.config, package).into()
    });

    Ok(Report::new(OPERATION, results))
}

/// Check one package
pub fn validate(
    invoker: &dyn ToolInvoker,
    config: &RunConfig,
    package: &PackageTarget,
) -> std::result::Result<(), TargetError> {
    let manifest = package.manifest()?;
    let target = manifest.name.clone();

    let mut diagnostics = Vec::new();
    for invocation in check_plan(config, manifest) {
        let invocation = invocation.cwd(&package.dir);
        let check = invocation.to_string();
        match invoker.run_step(&invocation) {
            Ok(_) => debug!("{}: {} passed", target, check),
            Err(StepFailure::Cancelled) => return Err(TargetError::Cancelled { target }),
            Err(StepFailure::Failed {
                diagnostics: output,
                ..
            }) => diagnostics.push(format!("$ {check}\n{output}")),
        }

        let clean = Invocation::new(&config.toolchain.cargo, config.timeout)
            .arg("clean")
            .cwd(&package.dir);
        match invoker.run_step(&clean) {
            Ok(_) => {}
            Err(StepFailure::Cancelled) => return Err(TargetError::Cancelled { target }),
            Err(StepFailure::Failed {
                diagnostics: output,
                ..
            }) => diagnostics.push(format!("$ {clean}\n{output}")),
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(TargetError::Validation {
            target,
            diagnostics: diagnostics.join("\n\n"),
        })
    }
}

/// `cargo check` invocations for a package, one per device feature
fn check_plan(config: &RunConfig, manifest: &PackageManifest) -> Vec<Invocation> {
    let check = || {
        let invocation = Invocation::new(&config.toolchain.cargo, config.timeout).arg("check");
        match &manifest.default_target {
            Some(triple) => invocation.arg("--target").arg(triple),
            None => invocation,
        }
    };

    let devices = manifest.device_features();
    if devices.is_empty() {
        return vec![check()];
    }

    let with_rt = manifest.has_feature(RT_FEATURE);
    devices
        .into_iter()
        .map(|device| {
            let features = if with_rt {
                format!("{RT_FEATURE},{device}")
            } else {
                device.to_string()
            };
            check().arg("--features").arg(features)
        })
        .collect()
}

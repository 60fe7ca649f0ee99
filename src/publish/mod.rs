//! `publish`: upload packages to the registry
//!
//! Packages go out one at a time in dependency order (see [`order`]). Each
//! publish is wrapped in `cargo clean` so stale build output of other devices
//! never ends up in the upload. Between real uploads the run waits
//! `--delay-secs` to stay below the registry rate limit.

pub mod order;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::discovery::{PackageTarget, find_packages};
use crate::error::{PacsError, Result, TargetError};
use crate::orchestrator::{Outcome, Report, RunContext};
use crate::tool::{CancelToken, Invocation, StepFailure, ToolInvoker};

pub const OPERATION: &str = "publish";

pub const DEFAULT_DELAY_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Exact package or directory names to leave out
    pub exclude: Vec<String>,
    pub dry_run: bool,
    /// Wait between two real uploads
    pub delay: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            dry_run: false,
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
        }
    }
}

/// Publish every eligible package below `dir`
pub fn run(ctx: &RunContext<'_>, dir: &Path, options: &PublishOptions) -> Result<Report> {
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

    let ordered: Vec<PackageTarget> = order::publish_order(&packages)
        .into_iter()
        .map(|i| packages[i].clone())
        .collect();
    info!(
        "publishing {} package(s){}",
        ordered.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let publisher = Publisher::new(ctx.invoker, ctx.config, &ctx.cancel, options);
    let results = ctx.batch(OPERATION, &ordered, 1, |package| {
        if options.exclude.iter().any(|name| package.matches(name)) {
            return Outcome::skipped("excluded");
        }
        if package.manifest.as_ref().is_ok_and(|m| !m.publish) {
            return Outcome::skipped("not publishable");
        }
        match publisher.publish(package) {
            Ok(()) if options.dry_run => Outcome::succeeded_with("dry run"),
            Ok(()) => Outcome::succeeded(),
            Err(error) => Outcome::failed(error),
        }
    });

    Ok(Report::new(OPERATION, results))
}

/// Publishes packages one after another, pacing real uploads
pub struct Publisher<'a> {
    invoker: &'a dyn ToolInvoker,
    config: &'a RunConfig,
    cancel: &'a CancelToken,
    options: &'a PublishOptions,
    uploaded: AtomicBool,
}

impl<'a> Publisher<'a> {
    pub fn new(
        invoker: &'a dyn ToolInvoker,
        config: &'a RunConfig,
        cancel: &'a CancelToken,
        options: &'a PublishOptions,
    ) -> Self {
        Self {
            invoker,
            config,
            cancel,
            options,
            uploaded: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, package: &PackageTarget) -> std::result::Result<(), TargetError> {
        let manifest = package.manifest()?;
        let target = manifest.name.clone();

        self.clean(package, &target)?;

        let mut invocation = Invocation::new(&self.config.toolchain.cargo, self.config.timeout)
            .arg("publish")
            .arg("--no-default-features");
        if let Some(triple) = &manifest.default_target {
            invocation = invocation.arg("--target").arg(triple);
        }
        if self.options.dry_run {
            invocation = invocation.arg("--dry-run");
        } else {
            self.pace(&target)?;
        }

        let step = self.invoker.run_step(&invocation.cwd(&package.dir));
        if let Err(failure) = step {
            return Err(publish_error(target, failure));
        }
        if !self.options.dry_run {
            self.uploaded.store(true, Ordering::SeqCst);
            info!("published {}", target);
        }

        // The upload already happened; a failing clean only leaves build output behind
        if let Err(e) = self.clean(package, &target) {
            warn!("{}", e);
        }
        Ok(())
    }

    /// Wait out the delay if something was uploaded before
    fn pace(&self, target: &str) -> std::result::Result<(), TargetError> {
        if !self.uploaded.load(Ordering::SeqCst) || self.options.delay.is_zero() {
            return Ok(());
        }
        info!(
            "waiting {}s before publishing {}",
            self.options.delay.as_secs(),
            target
        );
        if self.cancel.sleep(self.options.delay) {
            Ok(())
        } else {
            Err(TargetError::Cancelled {
                target: target.to_string(),
            })
        }
    }

    fn clean(&self, package: &PackageTarget, target: &str) -> std::result::Result<(), TargetError> {
        let invocation = Invocation::new(&self.config.toolchain.cargo, self.config.timeout)
            .arg("clean")
            .cwd(&package.dir);
        debug!("{}: {}", target, invocation);
        self.invoker
            .run_step(&invocation)
            .map(|_| ())
            .map_err(|failure| publish_error(target.to_string(), failure))
    }
}

fn publish_error(target: String, failure: StepFailure) -> TargetError {
    match failure {
        StepFailure::Cancelled => TargetError::Cancelled { target },
        StepFailure::Failed {
            exit_code,
            diagnostics,
        } => TargetError::Publish {
            target,
            exit_code,
            stderr: diagnostics,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::test_fixtures::{create_temp_dir, write_manifest, write_package};
    use crate::tool::ToolOutput;
    use crate::tool::fake::FakeInvoker;

    fn context<'a>(invoker: &'a FakeInvoker, config: &'a RunConfig) -> RunContext<'a> {
        RunContext {
            config,
            invoker,
            cancel: CancelToken::new(),
            quiet: true,
        }
    }

    fn no_delay() -> PublishOptions {
        PublishOptions {
            delay: Duration::ZERO,
            ..PublishOptions::default()
        }
    }

    /// Package names passed to `cargo publish`, in call order
    fn published(invoker: &FakeInvoker) -> Vec<String> {
        invoker
            .calls_to("cargo")
            .iter()
            .filter(|c| c.args[0] == "publish")
            .filter_map(|c| c.cwd.as_ref())
            .filter_map(|dir| dir.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_publish_wraps_upload_in_clean() {
        let temp = create_temp_dir();
        write_manifest(
            temp.path(),
            "efm32hg",
            "[package]\nname = \"efm32hg-pac\"\nversion = \"0.1.3\"\n\n[package.metadata.docs.rs]\ndefault-target = \"thumbv6m-none-eabi\"\n",
        );
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();

        let report = run(&context(&invoker, &config), temp.path(), &no_delay()).unwrap();
        assert!(!report.has_failures());
        let commands: Vec<String> = invoker
            .calls_to("cargo")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            commands,
            vec![
                "cargo clean",
                "cargo publish --no-default-features --target thumbv6m-none-eabi",
                "cargo clean",
            ]
        );
    }

    #[test]
    fn test_exclude_is_exact_and_case_sensitive() {
        let temp = create_temp_dir();
        write_package(temp.path(), "a", "efm32g-pac", "0.1.0");
        write_package(temp.path(), "b", "EFM32G-PAC", "0.1.0");
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();
        let options = PublishOptions {
            exclude: vec!["efm32g-pac".to_string()],
            ..no_delay()
        };

        let report = run(&context(&invoker, &config), temp.path(), &options).unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].outcome, Outcome::skipped("excluded"));
        assert!(report.results[1].outcome.is_success());
        assert_eq!(published(&invoker), vec!["b"]);
    }

    #[test]
    fn test_not_publishable_is_skipped() {
        let temp = create_temp_dir();
        write_manifest(
            temp.path(),
            "internal",
            "[package]\nname = \"internal\"\nversion = \"0.1.0\"\npublish = false\n",
        );
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();

        let report = run(&context(&invoker, &config), temp.path(), &no_delay()).unwrap();
        assert_eq!(report.results[0].outcome, Outcome::skipped("not publishable"));
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn test_dependencies_are_published_first() {
        let temp = create_temp_dir();
        write_manifest(
            temp.path(),
            "a",
            "[package]\nname = \"a\"\nversion = \"0.1.0\"\n\n[dependencies]\nb = { path = \"../b\", version = \"0.1\" }\n",
        );
        write_package(temp.path(), "b", "b", "0.1.0");
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();

        let report = run(&context(&invoker, &config), temp.path(), &no_delay()).unwrap();
        let targets: Vec<&str> = report.results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "a"]);
        assert_eq!(published(&invoker), vec!["b", "a"]);
    }

    #[test]
    fn test_failure_continues_with_next_package() {
        let temp = create_temp_dir();
        write_package(temp.path(), "a", "a", "0.1.0");
        write_package(temp.path(), "b", "b", "0.1.0");
        let invoker = FakeInvoker::with(|inv| {
            let in_a = inv.cwd.as_ref().is_some_and(|d| d.ends_with("a"));
            if inv.args[0] == "publish" && in_a {
                Ok(ToolOutput::failure(101, "error: crate version `0.1.0` is already uploaded"))
            } else {
                Ok(ToolOutput::success())
            }
        });
        let config = RunConfig::default();

        let report = run(&context(&invoker, &config), temp.path(), &no_delay()).unwrap();
        match report.results[0].outcome.error() {
            Some(TargetError::Publish {
                exit_code, stderr, ..
            }) => {
                assert_eq!(*exit_code, Some(101));
                assert!(stderr.contains("already uploaded"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(report.results[1].outcome.is_success());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_dry_run_passes_flag_and_does_not_wait() {
        let temp = create_temp_dir();
        write_package(temp.path(), "a", "a", "0.1.0");
        write_package(temp.path(), "b", "b", "0.1.0");
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();
        let options = PublishOptions {
            dry_run: true,
            delay: Duration::from_secs(3600),
            ..PublishOptions::default()
        };

        let started = Instant::now();
        let report = run(&context(&invoker, &config), temp.path(), &options).unwrap();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(report.results[0].outcome, Outcome::succeeded_with("dry run"));
        assert!(
            invoker
                .calls_to("cargo")
                .iter()
                .filter(|c| c.args[0] == "publish")
                .all(|c| c.args.last().map(String::as_str) == Some("--dry-run"))
        );
    }

    #[test]
    fn test_delay_between_real_uploads() {
        let temp = create_temp_dir();
        write_package(temp.path(), "a", "a", "0.1.0");
        write_package(temp.path(), "b", "b", "0.1.0");
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();
        let options = PublishOptions {
            delay: Duration::from_millis(200),
            ..PublishOptions::default()
        };

        let started = Instant::now();
        let report = run(&context(&invoker, &config), temp.path(), &options).unwrap();
        assert!(!report.has_failures());
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_cancelled_wait_cancels_package() {
        let temp = create_temp_dir();
        write_package(temp.path(), "a", "a", "0.1.0");
        let invoker = FakeInvoker::succeeding();
        let config = RunConfig::default();
        let cancel = CancelToken::new();
        let options = PublishOptions {
            delay: Duration::from_secs(3600),
            ..PublishOptions::default()
        };
        let publisher = Publisher::new(&invoker, &config, &cancel, &options);
        publisher.uploaded.store(true, Ordering::SeqCst);
        cancel.cancel();

        let packages = find_packages(temp.path()).unwrap();
        let err = publisher.publish(&packages[0]).unwrap_err();
        assert!(err.is_cancelled());
        assert!(published(&invoker).is_empty());
    }
}

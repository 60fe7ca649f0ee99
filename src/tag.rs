//! `tag`: release tags from package versions
//!
//! The tag of a package is its manifest version, verbatim (`0.2.1`), as a
//! lightweight tag on `HEAD` of the repository containing the package.
//! Packages of one series usually share a version and therefore a tag; the
//! second package then finds the tag already on `HEAD`, which is fine.

use std::path::Path;

use git2::{ErrorCode, Oid, Repository};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::discovery::{PackageTarget, find_packages};
use crate::error::{PacsError, Result, TargetError};
use crate::orchestrator::{Outcome, Report, RunContext};
use crate::tool::{Invocation, StepFailure, ToolInvoker};

pub const OPERATION: &str = "tag";

pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone)]
pub struct TagOptions {
    pub push: bool,
    pub remote: String,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            push: false,
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

/// What tagging did for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    Created(String),
    /// The tag already pointed at `HEAD`
    Unchanged(String),
}

impl TagAction {
    fn describe(&self, pushed: bool) -> String {
        let pushed = if pushed { ", pushed" } else { "" };
        match self {
            TagAction::Created(tag) => format!("tagged {tag}{pushed}"),
            TagAction::Unchanged(tag) => format!("{tag} already tagged{pushed}"),
        }
    }
}

/// Tag every package below `dir`
///
/// Always sequential: all packages usually share one repository.
pub fn run(ctx: &RunContext<'_>, dir: &Path, options: &TagOptions) -> Result<Report> {
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
    info!("tagging {} package(s)", packages.len());

    let results = ctx.batch(OPERATION, &packages, 1, |package| {
        match tag_package(ctx.invoker, ctx.config, package, options) {
            Ok(action) => Outcome::succeeded_with(action.describe(options.push)),
            Err(error) => Outcome::failed(error),
        }
    });

    Ok(Report::new(OPERATION, results))
}

/// Tag one package, pushing the tag if asked to
pub fn tag_package(
    invoker: &dyn ToolInvoker,
    config: &RunConfig,
    package: &PackageTarget,
    options: &TagOptions,
) -> std::result::Result<TagAction, TargetError> {
    let manifest = package.manifest()?;
    let target = manifest.name.as_str();
    let tag = release_tag(target, manifest.version.as_deref())?;

    let repo = Repository::discover(&package.dir).map_err(|e| git_error(target, &e))?;
    let action = apply_tag(&repo, target, &tag)?;
    debug!("{}: {:?}", target, action);

    if options.push {
        let workdir = repo.workdir().unwrap_or(&package.dir);
        push_tag(invoker, config, workdir, target, &options.remote, &tag)?;
    }
    Ok(action)
}

/// Validate the declared version; the tag is the normalized version
fn release_tag(target: &str, version: Option<&str>) -> std::result::Result<String, TargetError> {
    let Some(version) = version else {
        return Err(TargetError::MalformedVersion {
            target: target.to_string(),
            version: String::new(),
            reason: "no version declared".to_string(),
        });
    };
    semver::Version::parse(version)
        .map(|v| v.to_string())
        .map_err(|e| TargetError::MalformedVersion {
            target: target.to_string(),
            version: version.to_string(),
            reason: e.to_string(),
        })
}

fn apply_tag(
    repo: &Repository,
    target: &str,
    tag: &str,
) -> std::result::Result<TagAction, TargetError> {
    let git = |e: git2::Error| git_error(target, &e);

    let head = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(git)?;

    match repo.find_reference(&format!("refs/tags/{tag}")) {
        Ok(existing) => {
            let existing = existing.peel_to_commit().map_err(git)?.id();
            if existing == head.id() {
                Ok(TagAction::Unchanged(tag.to_string()))
            } else {
                Err(TargetError::TagConflict {
                    target: target.to_string(),
                    tag: tag.to_string(),
                    existing: short_id(existing),
                    head: short_id(head.id()),
                })
            }
        }
        Err(e) if e.code() == ErrorCode::NotFound => {
            repo.tag_lightweight(tag, head.as_object(), false)
                .map_err(git)?;
            info!("{}: created tag {} at {}", target, tag, short_id(head.id()));
            Ok(TagAction::Created(tag.to_string()))
        }
        Err(e) => Err(git(e)),
    }
}

fn push_tag(
    invoker: &dyn ToolInvoker,
    config: &RunConfig,
    workdir: &Path,
    target: &str,
    remote: &str,
    tag: &str,
) -> std::result::Result<(), TargetError> {
    let invocation = Invocation::new(&config.toolchain.git, config.timeout)
        .arg("push")
        .arg(remote)
        .arg(format!("refs/tags/{tag}"))
        .cwd(workdir);
    match invoker.run_step(&invocation) {
        Ok(_) => Ok(()),
        Err(StepFailure::Cancelled) => Err(TargetError::Cancelled {
            target: target.to_string(),
        }),
        Err(StepFailure::Failed { diagnostics, .. }) => Err(TargetError::Git {
            target: target.to_string(),
            reason: format!("pushing {tag} to {remote} failed: {diagnostics}"),
        }),
    }
}

fn git_error(target: &str, err: &git2::Error) -> TargetError {
    TargetError::Git {
        target: target.to_string(),
        reason: err.message().to_string(),
    }
}

fn short_id(oid: Oid) -> String {
    let id = oid.to_string();
    id.get(..12).unwrap_or(&id).to_string()
}

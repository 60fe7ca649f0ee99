//! Error types and handling for pacs-tools
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Two families of errors exist:
//! - [`PacsError`]: aborts the whole run (missing input directory, bad
//!   configuration, ...)
//! - [`TargetError`]: failure of a single target; recorded in the report while
//!   the batch keeps going

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Errors that abort a run
#[derive(Error, Diagnostic, Debug)]
pub enum PacsError {
    #[error("Input directory not found: {path}")]
    #[diagnostic(
        code(pacs::input::not_found),
        help("Check the directory argument; it must point to an existing directory")
    )]
    NotFound { path: String },

    #[error("No targets found in {path}")]
    #[diagnostic(
        code(pacs::input::empty),
        help("SVD files need a `.svd` extension; packages need a Cargo.toml with a [package] table")
    )]
    EmptyInput { path: String },

    #[error("Metadata file not found: {path}")]
    #[diagnostic(
        code(pacs::config::not_found),
        help("Pass --meta <path> or run from a directory containing mcu.toml")
    )]
    MetaNotFound { path: String },

    #[error("Failed to parse metadata file: {path}: {reason}")]
    #[diagnostic(code(pacs::config::parse_failed))]
    MetaParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(pacs::config::invalid))]
    ConfigInvalid { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(pacs::fs::io_error))]
    IoError { message: String },
}

impl From<std::io::Error> for PacsError {
    fn from(err: std::io::Error) -> Self {
        PacsError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PacsError {
    fn from(err: serde_json::Error) -> Self {
        PacsError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, PacsError>;

/// Failure of a single target
///
/// Tool failures carry `exit_code: None` when the process never produced an
/// exit status (timeout, spawn failure, killed by a signal); the reason is
/// then in `stderr`.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetError {
    #[error("Generation failed for '{target}' ({tool}, {}): {stderr}", exit_label(.exit_code))]
    #[diagnostic(code(pacs::generate::failed))]
    Generation {
        target: String,
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("'{target}' from {path} maps to the same directory as {first}")]
    #[diagnostic(
        code(pacs::generate::duplicate),
        help("Device and family names are lowercased file names; rename one of the files")
    )]
    Duplicate {
        target: String,
        path: String,
        first: String,
    },

    #[error("Scaffolding failed for '{target}': {reason}")]
    #[diagnostic(code(pacs::generate::scaffold_failed))]
    Scaffold { target: String, reason: String },

    #[error("Validation failed for '{target}':\n{diagnostics}")]
    #[diagnostic(code(pacs::check::failed))]
    Validation { target: String, diagnostics: String },

    #[error("Publishing '{target}' failed ({}): {stderr}", exit_label(.exit_code))]
    #[diagnostic(
        code(pacs::publish::failed),
        help("Re-run with --dry-run to see the registry client output without uploading")
    )]
    Publish {
        target: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Tag '{tag}' already exists at {existing}, but '{target}' is at {head}")]
    #[diagnostic(
        code(pacs::tag::conflict),
        help("Bump the package version or move the existing tag manually")
    )]
    TagConflict {
        target: String,
        tag: String,
        existing: String,
        head: String,
    },

    #[error("Malformed version '{version}' in '{target}': {reason}")]
    #[diagnostic(
        code(pacs::tag::malformed_version),
        help("Versions must follow semantic versioning, e.g. 0.2.1")
    )]
    MalformedVersion {
        target: String,
        version: String,
        reason: String,
    },

    #[error("Failed to read manifest of '{target}': {reason}")]
    #[diagnostic(code(pacs::manifest::read_failed))]
    Manifest { target: String, reason: String },

    #[error("Git operation failed for '{target}': {reason}")]
    #[diagnostic(code(pacs::git::target_failed))]
    Git { target: String, reason: String },

    #[error("IO error for '{target}': {reason}")]
    #[diagnostic(code(pacs::fs::target_io_error))]
    Io { target: String, reason: String },

    #[error("'{target}' was cancelled")]
    #[diagnostic(code(pacs::cancelled))]
    Cancelled { target: String },
}

impl TargetError {
    pub fn io(target: &str, err: &std::io::Error) -> Self {
        TargetError::Io {
            target: target.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TargetError::Cancelled { .. })
    }

    /// Short error kind used in the summary table
    pub fn kind(&self) -> &'static str {
        match self {
            TargetError::Generation { .. } => "GenerationError",
            TargetError::Duplicate { .. } => "DuplicateTargetError",
            TargetError::Scaffold { .. } => "ScaffoldError",
            TargetError::Validation { .. } => "ValidationError",
            TargetError::Publish { .. } => "PublishError",
            TargetError::TagConflict { .. } => "TagConflictError",
            TargetError::MalformedVersion { .. } => "MalformedVersionError",
            TargetError::Manifest { .. } => "ManifestError",
            TargetError::Git { .. } => "GitError",
            TargetError::Io { .. } => "IoError",
            TargetError::Cancelled { .. } => "Cancelled",
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

//! SVD patching with `svdtools`
//!
//! Patch files are templates: `{svd_path}` and `{peripheral_dir}` are
//! replaced before the patch is handed to `svdtools`, so the rendered copy
//! can live in the scratch directory. `{{` and `}}` stand for literal braces.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::move_path;
use crate::discovery::DeviceDescriptor;
use crate::error::TargetError;
use crate::tool::Invocation;

use super::Generator;

const PERIPHERAL_DIR: &str = "peripheral";
const PATCHED_EXTENSION: &str = "svd.patched";

/// Replace the known placeholders in a patch template
///
/// Unknown `{name}` sequences are kept as they are.
pub fn render(template: &str, svd_path: &Path, peripheral_dir: &Path) -> String {
    let svd_path = svd_path.display().to_string();
    let peripheral_dir = peripheral_dir.display().to_string();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if let Some(value) = tail.strip_prefix("{svd_path}") {
            out.push_str(&svd_path);
            rest = value;
        } else if let Some(value) = tail.strip_prefix("{peripheral_dir}") {
            out.push_str(&peripheral_dir);
            rest = value;
        } else {
            out.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Path where `svdtools` leaves the patched copy of `svd`
pub fn patched_path(svd: &Path) -> PathBuf {
    svd.with_extension(PATCHED_EXTENSION)
}

impl Generator<'_> {
    /// Patch the descriptor's SVD, returning the patched file inside `scratch`
    pub(super) fn apply_patch(
        &self,
        descriptor: &DeviceDescriptor,
        patch: &Path,
        scratch: &Path,
    ) -> Result<PathBuf, TargetError> {
        let target = descriptor.id();
        let io_error = |e: std::io::Error| TargetError::io(&target, &e);

        // svdtools resolves paths relative to the patch, which is about to move
        let svd_path = dunce::canonicalize(&descriptor.path).map_err(io_error)?;
        let peripheral_dir = patch
            .parent()
            .map(|dir| dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()))
            .unwrap_or_default()
            .join(PERIPHERAL_DIR);

        let template = fs::read_to_string(patch).map_err(io_error)?;
        let rendered = scratch.join(patch.file_name().unwrap_or_default());
        fs::write(&rendered, render(&template, &svd_path, &peripheral_dir)).map_err(io_error)?;

        self.step(
            &target,
            super::SVDTOOLS,
            Invocation::new(&self.config.toolchain.svdtools, self.config.timeout)
                .arg("patch")
                .path_arg(&rendered),
        )?;

        let produced = patched_path(&svd_path);
        if !produced.is_file() {
            return Err(super::missing_output(&target, super::SVDTOOLS, &produced));
        }
        let patched = scratch.join(produced.file_name().unwrap_or_default());
        move_path(&produced, &patched).map_err(io_error)?;
        Ok(patched)
    }
}

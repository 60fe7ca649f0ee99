//! Scratch directories for generation runs
//!
//! Generator output is staged in a scratch directory before it is moved into
//! the package. The base is never relative, so scratch dirs never end up under
//! the current working directory (e.g. with TMPDIR=tmp).

use std::env;
use std::path::PathBuf;

use tempfile::TempDir;

/// Overrides the scratch base directory
pub const SCRATCH_ENV: &str = "PACS_TOOLS_SCRATCH_DIR";

/// Directory under which scratch directories are created
pub fn scratch_base() -> PathBuf {
    if let Some(dir) = env::var_os(SCRATCH_ENV).map(PathBuf::from) {
        if dir.is_absolute() {
            return dir;
        }
    }

    let t = env::temp_dir();
    if t.is_absolute() {
        t
    } else {
        #[cfg(windows)]
        {
            env::var("TEMP")
                .or_else(|_| env::var("TMP"))
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
        }
        #[cfg(not(windows))]
        {
            PathBuf::from("/tmp")
        }
    }
}

/// Create a fresh scratch directory, removed when dropped
pub fn scratch_dir(label: &str) -> std::io::Result<TempDir> {
    let base = scratch_base();
    std::fs::create_dir_all(&base)?;
    tempfile::Builder::new()
        .prefix(&format!("pacs-{label}-"))
        .tempdir_in(base)
}

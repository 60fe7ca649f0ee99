//! Common file system operations used when placing generated sources

use std::fs;
use std::io;
use std::path::Path;

/// Copy a directory recursively
pub fn copy_dir_recursive<P1, P2>(src: P1, dst: P2) -> io::Result<()>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let src_ref = src.as_ref();
    let dst_ref = dst.as_ref();

    if !dst_ref.exists() {
        fs::create_dir_all(dst_ref)?;
    }

    for entry in fs::read_dir(src_ref)? {
        let entry = entry?;
        let entry_path = entry.path();
        let dst_path = dst_ref.join(entry.file_name());

        if entry_path.is_dir() {
            copy_dir_recursive(&entry_path, &dst_path)?;
        } else {
            fs::copy(&entry_path, &dst_path)?;
        }
    }

    Ok(())
}

/// Move a file or directory, replacing whatever is at `dst`
///
/// Falls back to copy and delete when `src` and `dst` are on different file
/// systems (scratch directories usually live on a tmpfs).
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    remove_path(dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    if src.is_dir() {
        copy_dir_recursive(src, dst)?;
        fs::remove_dir_all(src)
    } else {
        fs::copy(src, dst)?;
        fs::remove_file(src)
    }
}

/// Remove a file or directory if it exists
pub fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `dir` with an empty directory
pub fn recreate_dir(dir: &Path) -> io::Result<()> {
    remove_path(dir)?;
    fs::create_dir_all(dir)
}

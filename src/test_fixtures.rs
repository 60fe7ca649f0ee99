//! Test fixtures and utilities for reducing test setup duplication.
//!
//! Helpers to create SVD directories, generated packages and git repositories
//! with a single function call.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_fixtures::{create_git_repo, write_package};
//!
//! #[test]
//! fn my_test() {
//!     let (temp, repo) = create_git_repo();
//!     write_package(&repo, "pacs/efm32g", "efm32g-pac", "0.1.0");
//!     commit_all(&repo, "initial");
//! }
//! ```

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Create a temp directory in the scratch location.
///
/// # Panics
///
/// Panics if the temp directory cannot be created.
#[must_use]
pub fn create_temp_dir() -> TempDir {
    TempDir::new_in(crate::temp::scratch_base()).expect("Failed to create temp directory")
}

/// Create a temp directory with a git repository initialized.
///
/// Returns the `TempDir` (which cleans up on drop) and the path to the repo.
///
/// # Panics
///
/// Panics if the temp directory or git repository cannot be created.
#[must_use]
pub fn create_git_repo() -> (TempDir, PathBuf) {
    let temp = create_temp_dir();
    let path = temp.path().to_path_buf();
    git2::Repository::init(&path).expect("Failed to init git repository");
    (temp, path)
}

/// Write `content` to `root/relative`, creating parent directories.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(&path, content).expect("Failed to write file");
    path
}

/// Write a minimal package manifest at `root/relative/Cargo.toml`.
///
/// # Panics
///
/// Panics if the manifest cannot be written.
pub fn write_package(root: &Path, relative: &str, name: &str, version: &str) -> PathBuf {
    write_manifest(
        root,
        relative,
        &format!("[package]\nname = \"{name}\"\nversion = \"{version}\"\nedition = \"2021\"\n"),
    )
}

/// Write an arbitrary manifest at `root/relative/Cargo.toml`.
///
/// # Panics
///
/// Panics if the manifest cannot be written.
pub fn write_manifest(root: &Path, relative: &str, manifest: &str) -> PathBuf {
    write_file(root, &format!("{relative}/Cargo.toml"), manifest);
    root.join(relative)
}

/// Stage everything and commit on HEAD, returning the new commit id.
///
/// # Panics
///
/// Panics if the repository cannot be opened or the commit fails.
pub fn commit_all(repo_path: &Path, message: &str) -> git2::Oid {
    let repo = git2::Repository::open(repo_path).expect("Failed to open repository");
    let mut index = repo.index().expect("Failed to open index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("Failed to stage files");
    index.write().expect("Failed to write index");
    let tree_id = index.write_tree().expect("Failed to write tree");
    let tree = repo.find_tree(tree_id).expect("Failed to find tree");
    let signature = git2::Signature::now("pacs-tools", "pacs-tools@example.com")
        .expect("Failed to create signature");
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )
    .expect("Failed to commit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_git_repo() {
        let (_temp, path) = create_git_repo();
        assert!(path.join(".git").exists());
    }

    #[test]
    fn test_write_package() {
        let temp = create_temp_dir();
        let dir = write_package(temp.path(), "pacs/efm32g", "efm32g-pac", "0.1.0");
        assert_eq!(dir, temp.path().join("pacs/efm32g"));
        let manifest = std::fs::read_to_string(dir.join("Cargo.toml")).unwrap();
        assert!(manifest.contains("name = \"efm32g-pac\""));
    }

    #[test]
    fn test_commit_all_advances_head() {
        let (_temp, path) = create_git_repo();
        write_file(&path, "README.md", "one");
        let first = commit_all(&path, "first");
        write_file(&path, "README.md", "two");
        let second = commit_all(&path, "second");
        assert_ne!(first, second);

        let repo = git2::Repository::open(&path).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id(), second);
        assert_eq!(head.parent_id(0).unwrap(), first);
    }
}

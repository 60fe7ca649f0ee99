//! Target discovery
//!
//! This module handles:
//! - Enumerating SVD descriptors below an input directory ([`DescriptorSource`])
//! - Finding generated packages (directories with a `Cargo.toml` that has a
//!   `[package]` table) below a root directory ([`find_packages`])
//!
//! Both produce targets in a stable lexicographic order. Nothing is cached:
//! every call rescans the file system.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{PacsError, Result, TargetError};
use crate::manifest::{MANIFEST_FILE, PackageManifest};

const SVD_EXTENSION: &str = "svd";
const PATCH_DIR: &str = "patch";
const PATCH_EXTENSION: &str = "yaml";

/// One hardware variant to generate code for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Lowercased file stem; names the generated device module
    pub name: String,
    /// Package the device module belongs to
    pub family: String,
    pub path: PathBuf,
    pub patch: Option<PathBuf>,
    /// Earlier file that already maps to the same module or package directory
    pub duplicate_of: Option<PathBuf>,
}

impl DeviceDescriptor {
    /// Identifier used in reports
    pub fn id(&self) -> String {
        if self.family == self.name {
            self.name.clone()
        } else {
            format!("{}/{}", self.family, self.name)
        }
    }
}

/// Directory of SVD files
///
/// `*.svd` files directly inside the directory form single-device families;
/// every subdirectory is a family of its own. Patch files live in a `patch/`
/// directory next to the SVD files they apply to.
#[derive(Debug, Clone)]
pub struct DescriptorSource {
    root: PathBuf,
}

enum RootEntry {
    File(PathBuf),
    Family(String, PathBuf),
}

impl RootEntry {
    fn path(&self) -> &Path {
        match self {
            RootEntry::File(path) | RootEntry::Family(_, path) => path,
        }
    }
}

impl DescriptorSource {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(PacsError::NotFound {
                path: dir.display().to_string(),
            });
        }
        Ok(Self {
            root: dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the directory
    ///
    /// The top level is listed eagerly to establish the order; family
    /// directories are read as the iterator reaches them. Calling `iter`
    /// again starts a fresh scan.
    pub fn iter(&self) -> Result<impl Iterator<Item = DeviceDescriptor> + use<>> {
        let root_patches = patch_files(&self.root.join(PATCH_DIR));
        let mut entries = Vec::new();

        for path in sorted_dir(&self.root)? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                if file_name != PATCH_DIR {
                    let family = file_name.to_lowercase();
                    entries.push((family.clone(), RootEntry::Family(family, path)));
                }
            } else if let Some(name) = svd_name(&path) {
                entries.push((name, RootEntry::File(path)));
            }
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        // Names are lowercased, so `A.svd`, `a.svd` and a directory `a/` all
        // claim package `a`; the first in path order keeps it.
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        let entries: Vec<_> = entries
            .into_iter()
            .map(|(key, entry)| {
                let duplicate_of = match claimed.entry(key) {
                    Entry::Occupied(first) => Some(first.get().clone()),
                    Entry::Vacant(slot) => {
                        slot.insert(entry.path().to_path_buf());
                        None
                    }
                };
                (entry, duplicate_of)
            })
            .collect();

        Ok(entries.into_iter().flat_map(move |(entry, duplicate_of)| {
            let mut descriptors = match entry {
                RootEntry::File(path) => descriptor(path, None, &root_patches)
                    .into_iter()
                    .collect::<Vec<_>>(),
                RootEntry::Family(family, dir) => family_descriptors(&family, &dir),
            };
            if let Some(first) = duplicate_of {
                for descriptor in &mut descriptors {
                    descriptor.duplicate_of.get_or_insert_with(|| first.clone());
                }
            }
            descriptors
        }))
    }

    pub fn collect(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(self.iter()?.collect())
    }
}

fn family_descriptors(family: &str, dir: &Path) -> Vec<DeviceDescriptor> {
    let files = match sorted_dir(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("skipping family directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let patches = patch_files(&dir.join(PATCH_DIR));
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    files
        .into_iter()
        .filter(|p| p.is_file())
        .filter_map(|p| descriptor(p, Some(family), &patches))
        .map(|mut descriptor| {
            match claimed.entry(descriptor.name.clone()) {
                Entry::Occupied(first) => descriptor.duplicate_of = Some(first.get().clone()),
                Entry::Vacant(slot) => {
                    slot.insert(descriptor.path.clone());
                }
            }
            descriptor
        })
        .collect()
}

fn descriptor(
    path: PathBuf,
    family: Option<&str>,
    patches: &[PathBuf],
) -> Option<DeviceDescriptor> {
    let name = svd_name(&path)?;
    let patch = matching_patch(&name, patches);
    Some(DeviceDescriptor {
        family: family.map_or_else(|| name.clone(), str::to_string),
        name,
        path,
        patch,
        duplicate_of: None,
    })
}

fn svd_name(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !extension.eq_ignore_ascii_case(SVD_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
}

/// Longest patch stem that is a prefix of (or equal to) the descriptor name
fn matching_patch(name: &str, patches: &[PathBuf]) -> Option<PathBuf> {
    patches
        .iter()
        .filter_map(|p| {
            let stem = p.file_stem()?.to_str()?.to_lowercase();
            name.starts_with(&stem).then_some((stem.len(), p))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, p)| p.clone())
}

fn patch_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    sorted_dir(dir)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(PATCH_EXTENSION))
        })
        .collect()
}

fn sorted_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

/// A package directory found below a root
#[derive(Debug, Clone)]
pub struct PackageTarget {
    pub dir: PathBuf,
    /// Parsed manifest, or why it could not be read
    pub manifest: std::result::Result<PackageManifest, String>,
}

impl PackageTarget {
    /// Identifier used in reports: the package name, else the directory name
    pub fn id(&self) -> String {
        match &self.manifest {
            Ok(manifest) => manifest.name.clone(),
            Err(_) => self.dir_name(),
        }
    }

    pub fn dir_name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string())
    }

    pub fn manifest(&self) -> std::result::Result<&PackageManifest, TargetError> {
        self.manifest.as_ref().map_err(|reason| TargetError::Manifest {
            target: self.id(),
            reason: reason.clone(),
        })
    }

    /// Exact match against the package name or the directory name
    pub fn matches(&self, name: &str) -> bool {
        self.manifest.as_ref().is_ok_and(|m| m.name == name) || self.dir_name() == name
    }
}

/// Find package directories below `root`
///
/// Build output (`target/`) and hidden directories are not searched.
/// Manifests without a `[package]` table are skipped; manifests that cannot
/// be parsed are still returned so the failure shows up in the report.
pub fn find_packages(root: &Path) -> Result<Vec<PackageTarget>> {
    if !root.is_dir() {
        return Err(PacsError::NotFound {
            path: root.display().to_string(),
        });
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || e.file_name()
                    .to_str()
                    .is_some_and(|n| n != "target" && !n.starts_with('.'))
        });

    let mut packages = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST_FILE {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        match PackageManifest::read(dir) {
            Ok(Some(manifest)) => packages.push(PackageTarget {
                dir: dir.to_path_buf(),
                manifest: Ok(manifest),
            }),
            Ok(None) => {}
            Err(reason) => packages.push(PackageTarget {
                dir: dir.to_path_buf(),
                manifest: Err(reason),
            }),
        }
    }

    Ok(packages)
}

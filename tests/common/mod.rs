//! Common test utilities for pacs-tools integration tests
//!
//! External tools are replaced by small shell scripts written into the
//! workspace and selected through the `PACS_TOOLS_*` environment overrides.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// svd2rust stand-in: writes the files svd2rust would, fails for `B.svd`
pub const FAKE_SVD2RUST: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "svd2rust 0.33.5"
  exit 0
fi
in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$in" in
  *B.svd) echo "error: malformed register block in $in" >&2; exit 1 ;;
esac
mkdir -p "$out"
echo "pub struct Peripherals;" > "$out/mod.rs"
echo "pub struct Reg;" > "$out/generic.rs"
echo "PROVIDE(DefaultHandler);" > "$out/device.x"
echo "$in" >> "$(dirname "$0")/svd2rust.log"
"#;

/// form stand-in: writes the whole input as `lib.rs` of the output dir
pub const FAKE_FORM: &str = r#"#!/bin/sh
in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p "$out"
cp "$in" "$out/lib.rs"
"#;

/// Script that records its arguments in `<bin>/<name>.log` and exits with `code`
pub fn recording_tool(name: &str, code: i32) -> String {
    format!(
        "#!/bin/sh\necho \"$*\" >> \"$(dirname \"$0\")/{name}.log\"\n\
         if [ {code} -ne 0 ]; then echo \"{name} failed\" >&2; fi\nexit {code}\n"
    )
}

/// Script that records its arguments like [`recording_tool`], then hangs
pub fn hanging_tool(name: &str) -> String {
    format!("#!/bin/sh\necho \"$*\" >> \"$(dirname \"$0\")/{name}.log\"\nsleep 30\n")
}

/// A test workspace for integration tests
pub struct TestWorkspace {
    pub temp: TempDir,
    /// Path to workspace root
    pub path: PathBuf,
}

impl TestWorkspace {
    /// Create a new test workspace
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = dunce::canonicalize(temp.path()).expect("Failed to canonicalize temp dir");
        Self { temp, path }
    }

    /// Write a file in workspace
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    /// Read a file from workspace
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Check if a file exists in workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    pub fn create_dir(&self, path: &str) -> PathBuf {
        let dir = self.path.join(path);
        std::fs::create_dir_all(&dir).expect("Failed to create directory");
        dir
    }

    /// Write a minimal package manifest
    pub fn write_package(&self, dir: &str, name: &str, version: &str) -> PathBuf {
        self.write_file(
            &format!("{dir}/Cargo.toml"),
            &format!("[package]\nname = \"{name}\"\nversion = \"{version}\"\nedition = \"2021\"\n"),
        );
        self.path.join(dir)
    }

    /// Install an executable script under `bin/`
    pub fn install_tool(&self, name: &str, script: &str) -> PathBuf {
        let path = self.write_file(&format!("bin/{name}"), script);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("Failed to make tool executable");
        }
        path
    }

    /// Lines a recording tool logged, one per call
    pub fn tool_log(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.path.join(format!("bin/{name}.log")))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Fake svd2rust, form and rustfmt
    pub fn install_generator_tools(&self) {
        self.install_tool("svd2rust", FAKE_SVD2RUST);
        self.install_tool("form", FAKE_FORM);
        self.install_tool("rustfmt", &recording_tool("rustfmt", 0));
    }

    /// The binary, run from the workspace with every installed fake tool selected
    pub fn pacs_cmd(&self) -> Command {
        let mut cmd = pacs_cmd();
        cmd.current_dir(&self.path)
            .env("PACS_TOOLS_SCRATCH_DIR", self.path.join(".scratch"))
            .env_remove("RUST_LOG")
            .env_remove("PACS_TOOLS_JOBS")
            .env_remove("PACS_TOOLS_TIMEOUT");
        for (var, tool) in self.tool_overrides() {
            match tool {
                Some(path) => cmd.env(var, path),
                None => cmd.env_remove(var),
            };
        }
        cmd
    }

    /// Like [`Self::pacs_cmd`], for tests that need the running process
    pub fn pacs_process(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_pacs-tools"));
        cmd.current_dir(&self.path)
            .env("PACS_TOOLS_SCRATCH_DIR", self.path.join(".scratch"))
            .env_remove("RUST_LOG")
            .env_remove("PACS_TOOLS_JOBS")
            .env_remove("PACS_TOOLS_TIMEOUT");
        for (var, tool) in self.tool_overrides() {
            match tool {
                Some(path) => cmd.env(var, path),
                None => cmd.env_remove(var),
            };
        }
        cmd
    }

    /// `PACS_TOOLS_*` variables and the installed fake tool for each, if any
    fn tool_overrides(&self) -> Vec<(&'static str, Option<PathBuf>)> {
        [
            ("svd2rust", "PACS_TOOLS_SVD2RUST"),
            ("form", "PACS_TOOLS_FORM"),
            ("rustfmt", "PACS_TOOLS_RUSTFMT"),
            ("svdtools", "PACS_TOOLS_SVDTOOLS"),
            ("cargo", "PACS_TOOLS_CARGO"),
            ("git", "PACS_TOOLS_GIT"),
        ]
        .into_iter()
        .map(|(tool, var)| {
            let path = self.path.join("bin").join(tool);
            (var, path.is_file().then_some(path))
        })
        .collect()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

// Temporary fix for deprecated cargo_bin - will be updated when build-dir issues are resolved
#[allow(deprecated)]
pub fn pacs_cmd() -> Command {
    Command::cargo_bin("pacs-tools").expect("Failed to find pacs-tools binary")
}

/// Initialize a git repository with a committer identity
pub fn init_git_repo(path: &Path) -> git2::Repository {
    let repo = git2::Repository::init(path).expect("Failed to init repository");
    {
        let mut config = repo.config().expect("Failed to open repository config");
        config
            .set_str("user.name", "pacs-tools")
            .expect("Failed to set user.name");
        config
            .set_str("user.email", "pacs-tools@example.com")
            .expect("Failed to set user.email");
    }
    repo
}

/// Commit everything in the work tree, returning the new commit id
pub fn commit_all(repo: &git2::Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().expect("Failed to open index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("Failed to stage files");
    index.write().expect("Failed to write index");
    let tree_id = index.write_tree().expect("Failed to write tree");
    let tree = repo.find_tree(tree_id).expect("Failed to find tree");
    let signature = repo.signature().expect("Failed to build signature");
    let parents: Vec<git2::Commit> = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parents: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("Failed to commit")
}

use clap::Parser;
use std::path::PathBuf;

/// Arguments for the pacs-gen command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate next to the SVD directory (into ../pacs):\n    pacs-tools pacs-gen --svd-dir svd\n\n\
                  Generate with explicit metadata and output:\n    \
                  pacs-tools pacs-gen --svd-dir svd --out-dir pacs --meta mcu.toml")]
pub struct GenerateArgs {
    /// Directory with SVD files; subdirectories are package families
    #[arg(long, value_name = "PATH")]
    pub svd_dir: PathBuf,

    /// Output directory (defaults to `pacs/` next to the SVD directory)
    #[arg(long, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,

    /// Family metadata file (defaults to ./mcu.toml when present)
    #[arg(long, value_name = "PATH")]
    pub meta: Option<PathBuf>,
}

use clap::Parser;
use std::path::PathBuf;

/// Arguments for the docs-table command
#[derive(Parser, Debug)]
pub struct DocsTableArgs {
    /// Directory containing the packages
    #[arg(long, value_name = "PATH")]
    pub dir: PathBuf,

    /// Target triple shown for every package (defaults to each docs.rs default target)
    #[arg(long, value_name = "TRIPLE")]
    pub arch: Option<String>,
}

use clap::Parser;
use std::path::PathBuf;

use crate::publish::DEFAULT_DELAY_SECS;

/// Arguments for the publish command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Try publishing without uploading:\n    pacs-tools publish --dir pacs -n\n\n\
                  Publish everything but one package:\n    pacs-tools publish --dir pacs --exclude efm32gg11b-pac")]
pub struct PublishArgs {
    /// Directory containing the packages
    #[arg(long, value_name = "PATH")]
    pub dir: PathBuf,

    /// Package or directory name to skip (exact match, repeatable)
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Pass --dry-run to cargo publish
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Seconds to wait between two uploads
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_DELAY_SECS)]
    pub delay_secs: u64,
}

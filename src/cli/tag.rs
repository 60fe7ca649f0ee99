use clap::Parser;
use std::path::PathBuf;

use crate::tag::DEFAULT_REMOTE;

/// Arguments for the tag command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Tag HEAD with every package version:\n    pacs-tools tag --dir pacs\n\n\
                  Tag and push to a remote:\n    pacs-tools tag --dir pacs --push --remote upstream")]
pub struct TagArgs {
    /// Directory containing the packages
    #[arg(long, value_name = "PATH")]
    pub dir: PathBuf,

    /// Push created tags
    #[arg(long)]
    pub push: bool,

    /// Remote to push tags to
    #[arg(long, value_name = "NAME", default_value = DEFAULT_REMOTE)]
    pub remote: String,
}

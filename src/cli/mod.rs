//! CLI definitions using clap derive API
//!
//! One submodule per command holds its argument type:
//! - generate: `pacs-gen`
//! - test: `test`
//! - tag: `tag`
//! - publish: `publish`
//! - docs: `docs-table`
//! - completions: `completions`

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand};

pub mod completions;
pub mod docs;
pub mod generate;
pub mod publish;
pub mod tag;

pub use completions::CompletionsArgs;
pub use docs::DocsTableArgs;
pub use generate::GenerateArgs;
pub use publish::PublishArgs;
pub use tag::TagArgs;
pub use test::TestArgs;

use crate::config::DEFAULT_TIMEOUT_SECS;

/// pacs-tools - batch tooling for peripheral access crates
///
/// Generate, check, tag and publish PAC packages for whole MCU series.
#[derive(Parser, Debug)]
#[command(
    name = "pacs-tools",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Batch generation, checking, tagging and publishing of peripheral access crates",
    long_about = "pacs-tools drives svd2rust, form, rustfmt and cargo over a directory of SVD \
                  files or generated packages. Every target is processed even when others fail; \
                  the exit code is 1 if any target failed.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  pacs-tools pacs-gen --svd-dir svd              \x1b[90m# Generate into ../pacs\x1b[0m\n   \
                  pacs-tools -j 8 test --dir pacs                \x1b[90m# Check every device feature\x1b[0m\n   \
                  pacs-tools tag --dir pacs --push               \x1b[90m# Tag and push releases\x1b[0m\n   \
                  pacs-tools publish --dir pacs --dry-run        \x1b[90m# Try publishing\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Number of targets processed in parallel (pacs-gen and test)
    #[arg(
        long,
        short = 'j',
        global = true,
        env = "PACS_TOOLS_JOBS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub jobs: u16,

    /// Timeout in seconds for every external command
    #[arg(
        long,
        global = true,
        env = "PACS_TOOLS_TIMEOUT",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings, errors and the summary
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate device modules from SVD files and scaffold their packages
    #[command(name = "pacs-gen")]
    PacsGen(GenerateArgs),

    /// Check every device feature of generated packages
    Test(TestArgs),

    /// Tag package versions in git
    Tag(TagArgs),

    /// Publish packages in dependency order
    Publish(PublishArgs),

    /// Print a markdown table of packages with docs.rs and crates.io badges
    #[command(name = "docs-table")]
    DocsTable(DocsTableArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

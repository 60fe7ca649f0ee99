//! pacs-tools - batch tooling for peripheral access crates
//!
//! Generates device modules from SVD files with svd2rust, checks the generated
//! packages, tags their versions and publishes them, one target at a time (or
//! a few at a time with `--jobs`) while collecting a per-target report.

use clap::Parser;
use miette::Diagnostic;
use tracing::warn;

mod cli;
mod commands;
mod common;
mod config;
mod discovery;
mod docs_table;
mod error;
mod generate;
mod logging;
mod manifest;
mod orchestrator;
mod publish;
mod tag;
mod temp;
#[cfg(test)]
mod test_fixtures;
mod tool;
mod ui;
mod validate;

use cli::{Cli, Commands, GlobalArgs};
use config::RunConfig;
use error::Result;
use orchestrator::{Report, RunContext};
use tool::{CancelToken, SystemInvoker};

/// Run the selected command, returning the process exit code
fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::PacsGen(args) => batch(&cli.global, |ctx| commands::generate::run(ctx, args)),
        Commands::Test(args) => batch(&cli.global, |ctx| commands::test::run(ctx, args)),
        Commands::Tag(args) => batch(&cli.global, |ctx| commands::tag::run(ctx, args)),
        Commands::Publish(args) => batch(&cli.global, |ctx| commands::publish::run(ctx, args)),
        Commands::DocsTable(args) => commands::docs_table::run(args).map(|()| 0),
        Commands::Completions(args) => commands::completions::run(args).map(|()| 0),
    }
}

/// Set up cancellation and the tool invoker, run `op` and print its report
fn batch<F>(global: &GlobalArgs, op: F) -> Result<i32>
where
    F: FnOnce(&RunContext<'_>) -> Result<Report>,
{
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        warn!("cannot install Ctrl-C handler: {}", e);
    }

    let config = RunConfig::new(global.timeout, usize::from(global.jobs));
    let invoker = SystemInvoker::new(cancel.clone());
    let ctx = RunContext {
        config: &config,
        invoker: &invoker,
        cancel,
        quiet: global.quiet || global.json,
    };

    let report = op(&ctx)?;
    ui::summary::print(&report, global.json)?;
    Ok(report.exit_code())
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose, cli.global.quiet);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(help) = e.help() {
                eprintln!("  help: {}", help);
            }
            std::process::exit(1);
        }
    }
}

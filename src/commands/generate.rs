//! pacs-gen command

use crate::cli::GenerateArgs;
use crate::config::McuMeta;
use crate::error::Result;
use crate::generate::{self, GenerateRequest};
use crate::orchestrator::{Report, RunContext};

pub fn run(ctx: &RunContext<'_>, args: GenerateArgs) -> Result<Report> {
    let cwd = std::env::current_dir()?;
    let meta = McuMeta::locate(args.meta.as_deref(), &cwd)?;
    let out_dir = args
        .out_dir
        .unwrap_or_else(|| generate::default_out_dir(&args.svd_dir));

    generate::run(
        ctx,
        &GenerateRequest {
            svd_dir: args.svd_dir,
            out_dir,
            meta,
        },
    )
}

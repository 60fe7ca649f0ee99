//! publish command

use std::time::Duration;

use crate::cli::PublishArgs;
use crate::error::Result;
use crate::orchestrator::{Report, RunContext};
use crate::publish::{self, PublishOptions};

pub fn run(ctx: &RunContext<'_>, args: PublishArgs) -> Result<Report> {
    let options = PublishOptions {
        exclude: args.exclude,
        dry_run: args.dry_run,
        delay: Duration::from_secs(args.delay_secs),
    };
    publish::run(ctx, &args.dir, &options)
}

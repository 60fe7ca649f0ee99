//! tag command

use crate::cli::TagArgs;
use crate::error::Result;
use crate::orchestrator::{Report, RunContext};
use crate::tag::{self, TagOptions};

pub fn run(ctx: &RunContext<'_>, args: TagArgs) -> Result<Report> {
    let options = TagOptions {
        push: args.push,
        remote: args.remote,
    };
    tag::run(ctx, &args.dir, &options)
}

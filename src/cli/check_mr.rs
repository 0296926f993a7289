//! softlock check-mr command implementation
//!
//! Runs in CI, so it authenticates with the pipeline secret instead of a
//! user session.

use crate::error::Result;
use crate::ops::{validate_range, PIPELINE_SECRET_ENV};

use super::context::CommandContext;

/// Options for the check-mr command
pub struct CheckMrOptions {
    pub ref1: String,
    pub ref2: String,
    pub branch: String,
}

pub fn run(ctx: &CommandContext<'_>, options: CheckMrOptions) -> Result<()> {
    let secret = std::env::var(PIPELINE_SECRET_ENV).ok();
    ctx.with_client(|repo, client| {
        validate_range(
            repo,
            client,
            ctx.console,
            (options.ref1.as_str(), options.ref2.as_str()),
            &options.branch,
            secret,
        )
    })
}

//! softlock locks command implementation

use crate::error::Result;
use crate::ops::{ListOptions, LockService};

use super::context::CommandContext;

pub fn run(ctx: &CommandContext<'_>, options: ListOptions) -> Result<()> {
    ctx.with_sessions(|repo, client, sessions| {
        LockService::new(repo, client, sessions, ctx.config.web.clone(), ctx.console).list(&options)
    })
}

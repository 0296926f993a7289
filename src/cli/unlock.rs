//! softlock unlock command implementation
//!
//! Paths do not have to exist, so locks on deleted files can be released.

use crate::error::Result;
use crate::ops::LockService;

use super::context::CommandContext;

/// Options for the unlock command
pub struct UnlockOptions {
    pub paths: Vec<String>,
    pub force: bool,
}

pub fn run(ctx: &CommandContext<'_>, options: UnlockOptions) -> Result<()> {
    ctx.with_sessions(|repo, client, sessions| {
        let service = LockService::new(repo, client, sessions, ctx.config.web.clone(), ctx.console);
        let summary = service.release(&options.paths, options.force)?;
        tracing::debug!(
            succeeded = summary.succeeded,
            rejected = summary.rejected,
            force = options.force,
            "unlock batch finished"
        );
        Ok(())
    })
}

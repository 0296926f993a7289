//! softlock lock command implementation

use crate::error::Result;
use crate::ops::LockService;

use super::context::CommandContext;

/// Options for the lock command
pub struct LockOptions {
    pub paths: Vec<String>,
}

pub fn run(ctx: &CommandContext<'_>, options: LockOptions) -> Result<()> {
    ctx.with_sessions(|repo, client, sessions| {
        let service = LockService::new(repo, client, sessions, ctx.config.web.clone(), ctx.console);
        let summary = service.acquire(&options.paths)?;
        tracing::debug!(
            succeeded = summary.succeeded,
            rejected = summary.rejected,
            "lock batch finished"
        );
        Ok(())
    })
}

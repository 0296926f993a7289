//! softlock pre-commit command implementation

use crate::error::Result;
use crate::guard::check_commit;

use super::context::CommandContext;

pub fn run(ctx: &CommandContext<'_>) -> Result<()> {
    ctx.with_sessions(|repo, client, sessions| check_commit(repo, client, sessions, ctx.console))
}

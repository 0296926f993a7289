//! Commit-time lock enforcement, run from the git `pre-commit` hook.
//!
//! Which files are checked depends on what git is doing:
//! - merge in progress: files the merge itself changed (index tree differs
//!   from both parents). A conflict resolved by taking one side wholesale
//!   matches that parent and is not checked.
//! - interactive rebase: nothing is checked, the commits are not on a branch.
//! - normal commit: staged changes against HEAD.

use std::path::Path;

use serde_json::json;

use crate::client::LockServiceClient;
use crate::error::Result;
use crate::output::Console;
use crate::repo::RepoContext;
use crate::session::SessionManager;

/// Git state that decides which files a commit must hold locks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Merge,
    Rebase,
    Normal,
}

impl CommitState {
    pub fn detect(repo: &RepoContext<'_>, root: &Path) -> Self {
        let vcs = repo.vcs();
        if vcs.is_valid_ref(root, "MERGE_HEAD") {
            CommitState::Merge
        } else if vcs.is_valid_ref(root, "REBASE_HEAD") {
            CommitState::Rebase
        } else {
            CommitState::Normal
        }
    }
}

/// Files the commit being created touches.
pub fn modified_files(repo: &RepoContext<'_>, root: &Path, state: CommitState) -> Result<Vec<String>> {
    match state {
        CommitState::Merge => repo.vcs().merge_changes(root),
        CommitState::Rebase => Ok(Vec::new()),
        CommitState::Normal => repo.vcs().staged_changes(root),
    }
}

/// Ask the lock authority whether the commit may proceed. Returns `Ok` when
/// no lockable file is involved or the authority accepts; a rejection is
/// [`crate::Error::Rejected`].
pub fn check_commit(
    repo: &RepoContext<'_>,
    client: &LockServiceClient<'_>,
    sessions: &SessionManager<'_>,
    console: &Console,
) -> Result<()> {
    let root = repo.resolve_root()?;
    let state = CommitState::detect(repo, &root);
    tracing::debug!(?state, root = %root.display(), "pre-commit check");

    if state == CommitState::Rebase {
        console.note("Rebase in progress, skipping lock check");
        return Ok(());
    }

    let changed = modified_files(repo, &root, state)?;
    let files = repo.lockable_files(&root, &changed)?;
    if files.is_empty() {
        return Ok(());
    }

    console.out(format!("Checking:\n- {}", files.join("\n- ")));
    let repository = repo.repository_identifier(&root)?;
    let branch = repo.upstream_branch(&root)?;
    let session = sessions.find_authorization(&repository)?;

    let body = json!({
        "repository": repository,
        "files": files,
        "branch": branch,
    });
    client.post("/pre-commit", &body, session.authorization(), false)?;
    Ok(())
}

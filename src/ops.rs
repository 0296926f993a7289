//! Lock operations: acquire, release, list, and merge-request validation.
//!
//! Acquire and release work through a batch of paths one at a time. A
//! business error from the lock authority is printed to stderr and the batch
//! moves on; anything else (precondition, transport, auth) aborts the
//! command.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::client::{Envelope, LockServiceClient};
use crate::config::WebConfig;
use crate::error::{Error, Result};
use crate::listing::{
    parse_sort_keys, relativize_filenames, render_table, sort_records, LockFilter, LockRecord,
    PathFilter,
};
use crate::output::Console;
use crate::repo::{relative_path, RepoContext};
use crate::session::SessionManager;

/// Environment variable holding the bearer for `/check_mr`
pub const PIPELINE_SECRET_ENV: &str = "ZURU_PIPELINE_SECRET";

/// Outcome of an acquire or release batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub rejected: usize,
}

impl BatchSummary {
    fn record(&mut self, envelope: &Envelope, console: &Console) {
        match envelope.error() {
            Some(message) => {
                console.err(message);
                self.rejected += 1;
            }
            None => {
                console.out(result_line(envelope));
                self.succeeded += 1;
            }
        }
    }
}

/// Options for `softlock locks`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub pathspec: Option<String>,
    pub mine: bool,
    pub this_branch: bool,
    pub sort: Option<String>,
    pub full: bool,
    pub json: bool,
}

/// Lock, unlock, and list against the lock authority.
pub struct LockService<'a> {
    repo: &'a RepoContext<'a>,
    client: &'a LockServiceClient<'a>,
    sessions: &'a SessionManager<'a>,
    web: WebConfig,
    console: &'a Console,
}

impl<'a> LockService<'a> {
    pub fn new(
        repo: &'a RepoContext<'a>,
        client: &'a LockServiceClient<'a>,
        sessions: &'a SessionManager<'a>,
        web: WebConfig,
        console: &'a Console,
    ) -> Self {
        Self {
            repo,
            client,
            sessions,
            web,
            console,
        }
    }

    /// Take a lock on every existing file in `paths`.
    pub fn acquire(&self, paths: &[String]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for path in self.repo.clean_paths(paths, true)? {
            let target = self.resolve(&path)?;
            let branch = self.repo.upstream_branch(&target.root)?;
            let fullname = self.repo.full_name(&target.root)?;

            self.console.note(format!(
                "Locking file '{}' in repository '{}' in branch '{}'",
                target.relative, target.repository, branch
            ));
            tracing::debug!(path = %target.relative, repository = %target.repository, %branch, "acquiring lock");

            let session = self.sessions.find_authorization(&target.repository)?;
            let body = json!({
                "repository": target.repository,
                "fullname": fullname,
                "path": target.relative,
                "branch": branch,
            });
            let envelope = self
                .client
                .post("/lock", &body, session.authorization(), true)?;
            summary.record(&envelope, self.console);
        }

        Ok(summary)
    }

    /// Release locks on `paths`. The files need not exist any more.
    pub fn release(&self, paths: &[String], force: bool) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for path in self.repo.clean_paths(paths, false)? {
            let target = self.resolve(&path)?;

            self.console.note(format!(
                "Unlocking file '{}' in repository '{}'",
                target.relative, target.repository
            ));
            tracing::debug!(path = %target.relative, repository = %target.repository, force, "releasing lock");

            let session = self.sessions.find_authorization(&target.repository)?;
            let body = json!({
                "repository": target.repository,
                "path": target.relative,
                "force": force,
            });
            let envelope = self
                .client
                .post("/unlock", &body, session.authorization(), true)?;
            summary.record(&envelope, self.console);
        }

        Ok(summary)
    }

    /// Print the locks of the current repository.
    pub fn list(&self, options: &ListOptions) -> Result<()> {
        // Reject a bad --sort before touching the network.
        let sort_keys = parse_sort_keys(options.sort.as_deref())?;

        let root = self.repo.resolve_root()?;
        let repository = self.repo.repository_identifier(&root)?;
        let session = self.sessions.find_authorization(&repository)?;

        let envelope = self.client.post(
            "/get-locks",
            &json!({ "repository": repository, "output_json": true }),
            session.authorization(),
            false,
        )?;

        if options.json {
            self.console.out(result_line(&envelope));
            return Ok(());
        }

        let records = decode_records(&envelope)?;
        if records.is_empty() {
            self.console.out(format!(
                "No lock found for {}",
                self.web.project_url(&repository)
            ));
            return Ok(());
        }

        let mut filter = LockFilter::default();
        if let Some(pathspec) = &options.pathspec {
            self.console
                .note(format!("Filtering by path-spec '{pathspec}'"));
            let cwd_relative = relative_path(self.repo.cwd(), &root)?;
            filter.path = Some(PathFilter::from_pathspec(pathspec, &cwd_relative)?);
        }
        if options.mine {
            self.console
                .note(format!("Filtering by username '{}'", session.username()));
            filter.owner = Some(session.username().to_string());
        }
        if options.this_branch {
            let branch = self.repo.upstream_branch(&root)?;
            self.console.note(format!("Filtering by branch '{branch}'"));
            filter.branch = Some(branch);
        }

        let mut records = filter.apply(records);
        if records.is_empty() {
            self.console.out("No lock found for the provided filters");
            return Ok(());
        }

        sort_records(&mut records, &sort_keys);
        if !options.full {
            self.console.note(format!(
                "Relativize paths in '{}'",
                self.repo.cwd().display()
            ));
            relativize_filenames(&mut records, &root, self.repo.cwd());
        }

        self.console.out(render_table(&records));
        Ok(())
    }

    fn resolve(&self, path: &Path) -> Result<Target> {
        let root = self.repo.resolve_root_from_path(path)?;
        let relative = relative_path(path, &root)?;
        let repository = self.repo.repository_identifier(&root)?;
        Ok(Target {
            root,
            relative,
            repository,
        })
    }
}

struct Target {
    root: PathBuf,
    relative: String,
    repository: String,
}

/// Text printed for a successful reply: the `result` string, or the
/// payload's JSON when it is not a string.
fn result_line(envelope: &Envelope) -> String {
    match envelope.result() {
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

/// `/get-locks` returns the list as a JSON string inside `result`.
fn decode_records(envelope: &Envelope) -> Result<Vec<LockRecord>> {
    match envelope.result() {
        Some(Value::String(text)) => Ok(serde_json::from_str(text)?),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

/// Check that every lockable file changed between `ref1` and `ref2` is
/// locked on `branch`. Used from CI with the pipeline secret as bearer.
pub fn validate_range(
    repo: &RepoContext<'_>,
    client: &LockServiceClient<'_>,
    console: &Console,
    range: (&str, &str),
    branch: &str,
    secret: Option<String>,
) -> Result<()> {
    let (ref1, ref2) = range;
    let root = repo.resolve_root()?;

    for rev in [ref1, ref2] {
        if !repo.vcs().is_valid_ref(&root, rev) {
            return Err(Error::InvalidArgument(format!("unknown revision '{rev}'")));
        }
    }

    let changed = repo.vcs().changed_between(&root, ref1, ref2)?;
    let files = repo.lockable_files(&root, &changed)?;
    if files.is_empty() {
        console.note("No lockable file changed");
        return Ok(());
    }

    let secret = secret
        .filter(|value| !value.is_empty())
        .ok_or(Error::MissingSecret(PIPELINE_SECRET_ENV))?;
    let repository = repo.repository_identifier(&root)?;

    console.out(format!("File checked: \n - {}", files.join("\n - ")));
    let body = json!({
        "repository": repository,
        "files": files,
        "branch": branch,
    });
    client.post("/check_mr", &body, &secret, false)?;
    Ok(())
}

//! Read-only git queries behind a narrow capability trait.
//!
//! [`VcsPort`] is everything the lock client asks of the version-control
//! system. [`GitVcs`] answers through libgit2; unit tests substitute an
//! in-memory fake so path, branch, and protocol logic can run without a
//! repository on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use git2::{AttrCheckFlags, AttrValue, BranchType, Diff, ErrorCode, Repository, Tree};

use crate::error::{Error, Result};

/// Git attribute marking a path as lock-enforced
pub const LOCKABLE_ATTR: &str = "lockable";

/// Queries the lock client needs from git.
pub trait VcsPort {
    /// Root of the working tree containing `start`.
    fn discover_root(&self, start: &Path) -> Result<PathBuf>;

    /// URL of a named remote.
    fn remote_url(&self, root: &Path, remote: &str) -> Result<String>;

    /// Local branch checked out at HEAD, `None` when HEAD is detached.
    fn current_branch(&self, root: &Path) -> Result<Option<String>>;

    /// Upstream of a local branch in `remote/branch` form, if configured.
    fn upstream_of(&self, root: &Path, branch: &str) -> Result<Option<String>>;

    /// Configured `user.name`, if any.
    fn user_name(&self, root: &Path) -> Result<Option<String>>;

    /// Whether `rev` resolves to an object (e.g. `MERGE_HEAD`).
    fn is_valid_ref(&self, root: &Path, rev: &str) -> bool;

    /// Paths that differ between two revisions.
    fn changed_between(&self, root: &Path, from: &str, to: &str) -> Result<Vec<String>>;

    /// Paths staged in the index relative to HEAD.
    fn staged_changes(&self, root: &Path) -> Result<Vec<String>>;

    /// Paths where the index differs from both HEAD and MERGE_HEAD.
    fn merge_changes(&self, root: &Path) -> Result<Vec<String>>;

    /// Subset of `paths` whose `lockable` attribute is set.
    fn lockable(&self, root: &Path, paths: &[String]) -> Result<Vec<String>>;
}

/// libgit2-backed implementation of [`VcsPort`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GitVcs;

impl GitVcs {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, root: &Path) -> Result<Repository> {
        Repository::open(root).map_err(|err| {
            if err.code() == ErrorCode::NotFound {
                Error::NotARepo(root.to_path_buf())
            } else {
                Error::Git(err)
            }
        })
    }

    fn tree_for<'r>(&self, repo: &'r Repository, rev: &str) -> Result<Tree<'r>> {
        Ok(repo.revparse_single(rev)?.peel_to_tree()?)
    }
}

impl VcsPort for GitVcs {
    fn discover_root(&self, start: &Path) -> Result<PathBuf> {
        let repo = Repository::discover(start).map_err(|err| {
            if err.code() == ErrorCode::NotFound {
                Error::NotARepo(start.to_path_buf())
            } else {
                Error::Git(err)
            }
        })?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::NotARepo(start.to_path_buf()))?;
        Ok(workdir.canonicalize()?)
    }

    fn remote_url(&self, root: &Path, remote: &str) -> Result<String> {
        let repo = self.open(root)?;
        let found = repo.find_remote(remote)?;
        found.url().map(str::to_string).ok_or_else(|| {
            Error::OperationFailed(format!("remote '{remote}' has no valid url"))
        })
    }

    fn current_branch(&self, root: &Path) -> Result<Option<String>> {
        let repo = self.open(root)?;
        if repo.head_detached()? {
            return Ok(None);
        }

        let head = repo.head()?;
        Ok(head.shorthand().map(str::to_string))
    }

    fn upstream_of(&self, root: &Path, branch: &str) -> Result<Option<String>> {
        let repo = self.open(root)?;
        let local = repo.find_branch(branch, BranchType::Local)?;
        let upstream = match local.upstream() {
            Ok(upstream) => upstream,
            Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
            Err(err) => return Err(Error::Git(err)),
        };
        Ok(upstream.name()?.map(str::to_string))
    }

    fn user_name(&self, root: &Path) -> Result<Option<String>> {
        let repo = self.open(root)?;
        let config = repo.config()?;
        match config.get_string("user.name") {
            Ok(name) => Ok(Some(name)),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::Git(err)),
        }
    }

    fn is_valid_ref(&self, root: &Path, rev: &str) -> bool {
        self.open(root)
            .map(|repo| repo.revparse_single(rev).is_ok())
            .unwrap_or(false)
    }

    fn changed_between(&self, root: &Path, from: &str, to: &str) -> Result<Vec<String>> {
        let repo = self.open(root)?;
        let old = self.tree_for(&repo, from)?;
        let new = self.tree_for(&repo, to)?;
        let diff = repo.diff_tree_to_tree(Some(&old), Some(&new), None)?;
        Ok(diff_paths(&diff))
    }

    fn staged_changes(&self, root: &Path) -> Result<Vec<String>> {
        let repo = self.open(root)?;
        // Unborn HEAD: every staged path is new.
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(err) if err.code() == ErrorCode::UnbornBranch => None,
            Err(err) => return Err(Error::Git(err)),
        };
        let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
        Ok(diff_paths(&diff))
    }

    fn merge_changes(&self, root: &Path) -> Result<Vec<String>> {
        let repo = self.open(root)?;
        let mut index = repo.index()?;
        let merged_oid = index.write_tree()?;
        let merged = repo.find_tree(merged_oid)?;
        let head = self.tree_for(&repo, "HEAD")?;
        let theirs = self.tree_for(&repo, "MERGE_HEAD")?;

        let against_head = diff_paths(&repo.diff_tree_to_tree(Some(&head), Some(&merged), None)?);
        let against_theirs: HashSet<String> = diff_paths(&repo.diff_tree_to_tree(
            Some(&theirs),
            Some(&merged),
            None,
        )?)
        .into_iter()
        .collect();

        Ok(against_head
            .into_iter()
            .filter(|path| against_theirs.contains(path))
            .collect())
    }

    fn lockable(&self, root: &Path, paths: &[String]) -> Result<Vec<String>> {
        let repo = self.open(root)?;
        let mut lockable = Vec::new();
        for path in paths {
            let value = repo.get_attr(
                Path::new(path),
                LOCKABLE_ATTR,
                AttrCheckFlags::FILE_THEN_INDEX,
            )?;
            if matches!(AttrValue::from_string(value), AttrValue::True) {
                lockable.push(path.clone());
            }
        }
        Ok(lockable)
    }
}

fn diff_paths(diff: &Diff<'_>) -> Vec<String> {
    diff.deltas()
        .filter_map(|delta| {
            let new_file = delta.new_file();
            let old_file = delta.old_file();
            let path = new_file.path().or_else(|| old_file.path())?;
            Some(path.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

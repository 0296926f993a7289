//! In-memory fakes for the git, signing, and transport ports.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::client::{RawResponse, Transport};
use crate::error::{Error, Result};
use crate::signing::SigningPort;
use crate::vcs::VcsPort;

/// Scripted repository state.
#[derive(Debug, Default)]
pub struct FakeVcs {
    root: PathBuf,
    remote_url: Option<String>,
    branch: Option<String>,
    upstream: Option<String>,
    user_name: Option<String>,
    valid_refs: HashSet<String>,
    changed: HashMap<(String, String), Vec<String>>,
    staged: Vec<String>,
    merge: Vec<String>,
    lockable: HashSet<String>,
    lookups: Cell<usize>,
}

impl FakeVcs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            branch: Some("main".to_string()),
            ..Self::default()
        }
    }

    pub fn with_remote(mut self, url: &str) -> Self {
        self.remote_url = Some(url.to_string());
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn detached(mut self) -> Self {
        self.branch = None;
        self
    }

    pub fn with_upstream(mut self, upstream: &str) -> Self {
        self.upstream = Some(upstream.to_string());
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    pub fn with_ref(mut self, rev: &str) -> Self {
        self.valid_refs.insert(rev.to_string());
        self
    }

    pub fn with_changed(mut self, from: &str, to: &str, paths: &[&str]) -> Self {
        self.changed.insert(
            (from.to_string(), to.to_string()),
            paths.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_staged(mut self, paths: &[&str]) -> Self {
        self.staged = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_merge(mut self, paths: &[&str]) -> Self {
        self.merge = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_lockable(mut self, paths: &[&str]) -> Self {
        self.lockable = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Number of file-list and attribute queries served.
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    fn count_lookup(&self) {
        self.lookups.set(self.lookups.get() + 1);
    }
}

impl VcsPort for FakeVcs {
    fn discover_root(&self, start: &Path) -> Result<PathBuf> {
        if start.starts_with(&self.root) {
            Ok(self.root.clone())
        } else {
            Err(Error::NotARepo(start.to_path_buf()))
        }
    }

    fn remote_url(&self, _root: &Path, remote: &str) -> Result<String> {
        self.remote_url
            .clone()
            .ok_or_else(|| Error::OperationFailed(format!("remote '{remote}' does not exist")))
    }

    fn current_branch(&self, _root: &Path) -> Result<Option<String>> {
        Ok(self.branch.clone())
    }

    fn upstream_of(&self, _root: &Path, _branch: &str) -> Result<Option<String>> {
        Ok(self.upstream.clone())
    }

    fn user_name(&self, _root: &Path) -> Result<Option<String>> {
        Ok(self.user_name.clone())
    }

    fn is_valid_ref(&self, _root: &Path, rev: &str) -> bool {
        self.valid_refs.contains(rev)
    }

    fn changed_between(&self, _root: &Path, from: &str, to: &str) -> Result<Vec<String>> {
        self.count_lookup();
        Ok(self
            .changed
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn staged_changes(&self, _root: &Path) -> Result<Vec<String>> {
        self.count_lookup();
        Ok(self.staged.clone())
    }

    fn merge_changes(&self, _root: &Path) -> Result<Vec<String>> {
        self.count_lookup();
        Ok(self.merge.clone())
    }

    fn lockable(&self, _root: &Path, paths: &[String]) -> Result<Vec<String>> {
        self.count_lookup();
        Ok(paths
            .iter()
            .filter(|path| self.lockable.contains(*path))
            .cloned()
            .collect())
    }
}

/// Signer returning a fixed authorization and recording each handshake.
#[derive(Debug)]
pub struct FakeSigner {
    authorization: String,
    repositories: RefCell<Vec<String>>,
}

impl FakeSigner {
    pub fn new(authorization: &str) -> Self {
        Self {
            authorization: authorization.to_string(),
            repositories: RefCell::new(Vec::new()),
        }
    }

    pub fn handshakes(&self) -> usize {
        self.repositories.borrow().len()
    }

    pub fn repositories(&self) -> Vec<String> {
        self.repositories.borrow().clone()
    }
}

impl SigningPort for FakeSigner {
    fn lfs_authorization(&self, repository: &str) -> Result<String> {
        self.repositories.borrow_mut().push(repository.to_string());
        Ok(self.authorization.clone())
    }
}

/// One request seen by [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub body: Value,
    pub authorization: String,
}

/// Transport with scripted replies per route.
///
/// Replies queued for a route are served in order; the last one repeats.
#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: RefCell<HashMap<String, VecDeque<RawResponse>>>,
    calls: RefCell<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, status: u16, body: &str) -> Self {
        self.replies
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push_back(RawResponse::new(status, body));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.path.clone()).collect()
    }
}

impl Transport for FakeTransport {
    fn post(&self, path: &str, body: &Value, authorization: &str) -> Result<RawResponse> {
        self.calls.borrow_mut().push(Call {
            path: path.to_string(),
            body: body.clone(),
            authorization: authorization.to_string(),
        });

        let mut replies = self.replies.borrow_mut();
        let queue = replies
            .get_mut(path)
            .ok_or_else(|| Error::OperationFailed(format!("no scripted reply for {path}")))?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        reply.ok_or_else(|| Error::OperationFailed(format!("no scripted reply for {path}")))
    }
}

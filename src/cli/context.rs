//! Wiring shared by every subcommand: git access, configuration, the lock
//! authority client, and the session manager.

use std::path::PathBuf;

use crate::client::{HttpTransport, LockServiceClient};
use crate::config::Config;
use crate::error::Result;
use crate::output::Console;
use crate::repo::RepoContext;
use crate::session::{SessionManager, TokenStore};
use crate::signing::SshSigner;
use crate::vcs::{GitVcs, VcsPort};

pub struct CommandContext<'a> {
    pub console: &'a Console,
    pub config: Config,
    vcs: GitVcs,
    cwd: PathBuf,
}

impl<'a> CommandContext<'a> {
    pub fn new(repo: Option<PathBuf>, console: &'a Console) -> Result<Self> {
        let cwd = match repo {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let vcs = GitVcs::new();

        // Outside a repository the defaults apply; commands that need a
        // repository report that themselves.
        let config = match vcs.discover_root(&cwd) {
            Ok(root) => Config::load_from_repo(&root)?,
            Err(_) => Config::default(),
        };
        tracing::debug!(cwd = %cwd.display(), host = %config.server.host, "command context ready");

        Ok(Self {
            console,
            config,
            vcs,
            cwd,
        })
    }

    pub fn repo(&self) -> RepoContext<'_> {
        RepoContext::new(
            &self.vcs,
            self.config.git.clone(),
            self.cwd.clone(),
            self.console,
        )
    }

    /// Run `f` with a lock authority client (no session).
    pub fn with_client<T>(
        &self,
        f: impl FnOnce(&RepoContext<'_>, &LockServiceClient<'_>) -> Result<T>,
    ) -> Result<T> {
        let repo = self.repo();
        let transport = HttpTransport::new(&self.config.server)?;
        let client = LockServiceClient::new(&transport, self.console);
        f(&repo, &client)
    }

    /// Run `f` with a client and a session manager backed by the user's
    /// token store.
    pub fn with_sessions<T>(
        &self,
        f: impl FnOnce(&RepoContext<'_>, &LockServiceClient<'_>, &SessionManager<'_>) -> Result<T>,
    ) -> Result<T> {
        let store = TokenStore::default_location()?;
        self.with_client(|repo, client| {
            let signer = SshSigner::new(self.config.git.ssh_host.clone(), self.console);
            let sessions = SessionManager::new(store, client, &signer, self.console);
            f(repo, client, &sessions)
        })
    }
}

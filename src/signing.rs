//! Git LFS credential handshake through an external SSH client.
//!
//! The lock authority accepts the bearer header that the git host issues
//! for LFS uploads. It is obtained by running
//! `ssh git@<host> git-lfs-authenticate <repository> upload` and reading
//! `header.Authorization` from the JSON it prints.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::output::Console;

/// Produces a signed LFS authorization for a repository.
pub trait SigningPort {
    fn lfs_authorization(&self, repository: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct LfsAuthenticateResponse {
    header: LfsHeader,
}

#[derive(Debug, Deserialize)]
struct LfsHeader {
    #[serde(rename = "Authorization")]
    authorization: String,
}

/// Extract `header.Authorization` from `git-lfs-authenticate` output.
pub fn parse_lfs_authorization(output: &str) -> Result<String> {
    let response: LfsAuthenticateResponse = serde_json::from_str(output.trim())
        .map_err(|err| Error::Handshake(format!("unexpected git-lfs-authenticate output: {err}")))?;
    Ok(response.header.authorization)
}

/// Locate the SSH client: `GIT_SSH` first, then `ssh` on `PATH`.
pub fn find_ssh() -> Result<PathBuf> {
    if let Some(ssh) = std::env::var_os("GIT_SSH").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(ssh));
    }

    which::which("ssh").map_err(|_| Error::SshNotFound)
}

/// [`SigningPort`] backed by the system SSH client.
pub struct SshSigner<'a> {
    ssh_host: String,
    console: &'a Console,
}

impl<'a> SshSigner<'a> {
    pub fn new(ssh_host: impl Into<String>, console: &'a Console) -> Self {
        Self {
            ssh_host: ssh_host.into(),
            console,
        }
    }
}

impl SigningPort for SshSigner<'_> {
    fn lfs_authorization(&self, repository: &str) -> Result<String> {
        let ssh = find_ssh()?;
        self.console.note(format!("ssh found: {}", ssh.display()));
        self.console.note("generating GitLab token");

        let output = Command::new(&ssh)
            .arg(format!("git@{}", self.ssh_host))
            .args(["git-lfs-authenticate", repository, "upload"])
            .output()?;

        if !output.status.success() {
            return Err(Error::Handshake(format!(
                "'{} git@{} git-lfs-authenticate {} upload' finished with {}: {}",
                ssh.display(),
                self.ssh_host,
                repository,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let authorization = parse_lfs_authorization(&String::from_utf8_lossy(&output.stdout))?;
        self.console.note("token generated");
        Ok(authorization)
    }
}

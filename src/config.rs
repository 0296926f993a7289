//! Configuration loading and management
//!
//! Handles parsing of the optional `.softlock.toml` file at the repository
//! root. Every key has a default, so a repository without the file talks to
//! the production lock authority through `origin` on gitlab.com.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the per-repository configuration file
pub const CONFIG_FILENAME: &str = ".softlock.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Lock authority endpoint
    #[serde(default)]
    pub server: ServerConfig,

    /// Git naming conventions
    #[serde(default)]
    pub git: GitConfig,

    /// Web front end of the git host
    #[serde(default)]
    pub web: WebConfig,
}

/// Lock authority endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub use_https: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "api.zuru-soft-lock.dreamcatcher.zuru.link".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            use_https: default_true(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash, e.g. `https://host:443`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Git naming conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote whose URL names the repository and whose branches are upstreams
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Host accepted in `git@<host>:<path>` remotes and used for the LFS handshake
    #[serde(default = "default_ssh_host")]
    pub ssh_host: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_ssh_host() -> String {
    "gitlab.com".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            ssh_host: default_ssh_host(),
        }
    }
}

/// Web front end of the git host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://gitlab.com".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl WebConfig {
    /// Browser URL of a repository, e.g. `https://gitlab.com/group/project`.
    pub fn project_url(&self, repository: &str) -> String {
        let repository = repository.strip_suffix(".git").unwrap_or(repository);
        format!("{}/{}", self.base_url.trim_end_matches('/'), repository)
    }
}

impl Config {
    /// Load configuration from a specific file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.softlock.toml` from the repository root. Defaults apply only
    /// when the file is absent; a file that does not parse or validate is an
    /// error so requests never fall back to the default host.
    pub fn load_from_repo(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        tracing::debug!(path = %path.display(), "loading config");
        Self::load(&path)
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::InvalidConfig("server.host cannot be empty".to_string()));
        }
        if self.server.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "server.timeout_secs must be positive".to_string(),
            ));
        }
        if self.git.remote.trim().is_empty() {
            return Err(Error::InvalidConfig("git.remote cannot be empty".to_string()));
        }
        Ok(())
    }
}

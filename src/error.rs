//! Error types for softlock
//!
//! Exit codes:
//! - 0: Success
//! - 2: Precondition failed (not a repo, detached HEAD, no upstream, bad args)
//! - 3: Rejected by the lock authority
//! - 4: Operation failed (transport, git, I/O, environment)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the softlock CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const PRECONDITION: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for softlock operations
#[derive(Error, Debug)]
pub enum Error {
    // Precondition errors (exit code 2)
    #[error("Not a git repository: {0}")]
    NotARepo(PathBuf),

    #[error("detached HEAD")]
    DetachedHead(PathBuf),

    #[error("no upstream configured for current branch")]
    NoUpstream { repo: PathBuf, local_branch: String },

    #[error("File outside repository: {0}")]
    PathOutsideRepository(PathBuf),

    #[error("Cannot find file '{0}'")]
    FileNotFound(PathBuf),

    #[error("Unrecognized remote url '{0}'")]
    UnrecognizedRemote(String),

    #[error("user.name not found in directory {0}")]
    MissingIdentity(PathBuf),

    #[error("Invalid comparison key '{0}'")]
    InvalidSortKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Rejected by the lock authority (exit code 3)
    #[error("Not authorized")]
    NotAuthorized,

    #[error("{0}")]
    Rejected(String),

    // Operation failures (exit code 4)
    #[error("Connection failed {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server replied with {status} {body}")]
    ServerStatus { status: u16, body: String },

    #[error("ssh not found")]
    SshNotFound,

    #[error("Environment variable {0} not found")]
    MissingSecret(&'static str),

    #[error("Authentication handshake failed: {0}")]
    Handshake(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session token is busy: another softlock run still holds {0}")]
    TokenBusy(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotARepo(_)
            | Error::DetachedHead(_)
            | Error::NoUpstream { .. }
            | Error::PathOutsideRepository(_)
            | Error::FileNotFound(_)
            | Error::UnrecognizedRemote(_)
            | Error::MissingIdentity(_)
            | Error::InvalidSortKey(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::PRECONDITION,

            Error::NotAuthorized | Error::Rejected(_) => exit_codes::REJECTED,

            Error::Transport { .. }
            | Error::ServerStatus { .. }
            | Error::SshNotFound
            | Error::MissingSecret(_)
            | Error::Handshake(_)
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TokenBusy(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }
}

/// Result type alias for softlock operations
pub type Result<T> = std::result::Result<T, Error>;

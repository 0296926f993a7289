//! softlock - Soft Lock client library
//!
//! Advisory, server-mediated file locks for git repositories holding
//! binary assets that cannot be merged. The lock authority is the source of
//! truth; this crate resolves repository identity, keeps an authenticated
//! session, and issues lock, unlock, list, and check requests.
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.softlock.toml`
//! - `error`: Error types, exit codes, and result alias
//! - `vcs`: Git queries using libgit2
//! - `repo`: Repository root, identifier, upstream branch, relative paths
//! - `signing`: LFS credential handshake through SSH
//! - `session`: Cached session token and refresh
//! - `client`: HTTP client for the lock authority
//! - `ops`: Lock, unlock, list, and merge-request validation
//! - `listing`: Lock list filtering, natural sorting, and table output
//! - `guard`: Pre-commit lock enforcement
//! - `output`: Console output and error reporting
//! - `lock`: File locking and atomic writes for the token file

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod listing;
pub mod lock;
pub mod ops;
pub mod output;
pub mod repo;
pub mod session;
pub mod signing;
pub mod vcs;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

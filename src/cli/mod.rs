//! Command-line interface for softlock
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::Console;

mod check_mr;
mod context;
mod lock;
mod locks;
mod pre_commit;
mod unlock;

/// softlock - advisory file locks for git repositories
///
/// Locks are held by a lock authority keyed by repository, path, and
/// branch. The pre-commit hook refuses commits touching lockable files
/// you do not hold.
#[derive(Parser, Debug)]
#[command(name = "softlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Run as if started in this directory
    #[arg(long, global = true, env = "SOFTLOCK_REPO")]
    pub repo: Option<PathBuf>,

    /// Show verbose messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lock the specified files
    Lock {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,
    },

    /// Unlock the specified files
    Unlock {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,

        /// Force delete a lock held by someone else
        #[arg(short, long)]
        force: bool,
    },

    /// Print the list of currently locked files
    #[command(after_help = "\
Examples:
  softlock locks --sort path     # Sort by file names
  softlock locks --sort branch   # Sort by branch name
  softlock locks --sort author   # Sort by lock owner
  softlock locks \"WBP_*\"         # Show only widget blueprints")]
    Locks {
        /// Pattern used to filter results (eg: "*.uasset", "BP_*", ".")
        pathspec: Option<String>,

        /// Show paths relative to the repository root instead of the
        /// current directory
        #[arg(long)]
        full: bool,

        /// Sort results by path, branch, author (comma separated)
        #[arg(short, long, value_name = "KEYS")]
        sort: Option<String>,

        /// Print the lock list as returned by the server (no filtering or
        /// sorting)
        #[arg(long)]
        json: bool,

        /// Show only locks from the current user
        #[arg(long)]
        mine: bool,

        /// Show only locks from the current branch
        #[arg(short = 'b', long = "this_branch", alias = "this-branch")]
        this_branch: bool,
    },

    /// Verify that all lockable files modified between two revisions are
    /// locked (CI use; needs ZURU_PIPELINE_SECRET)
    CheckMr {
        ref1: String,
        ref2: String,

        /// Branch the merge request targets
        #[arg(long, required = true)]
        branch: String,
    },

    /// Check the commit being created against held locks (git hook)
    PreCommit,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self, console: &Console) -> Result<()> {
        let ctx = context::CommandContext::new(self.repo, console)?;

        match self.command {
            Commands::Lock { paths } => lock::run(&ctx, lock::LockOptions { paths }),
            Commands::Unlock { paths, force } => {
                unlock::run(&ctx, unlock::UnlockOptions { paths, force })
            }
            Commands::Locks {
                pathspec,
                full,
                sort,
                json,
                mine,
                this_branch,
            } => locks::run(
                &ctx,
                crate::ops::ListOptions {
                    pathspec,
                    mine,
                    this_branch,
                    sort,
                    full,
                    json,
                },
            ),
            Commands::CheckMr { ref1, ref2, branch } => check_mr::run(
                &ctx,
                check_mr::CheckMrOptions { ref1, ref2, branch },
            ),
            Commands::PreCommit => pre_commit::run(&ctx),
        }
    }
}

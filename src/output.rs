//! Shared output for softlock commands.
//!
//! Every command writes through a [`Console`] that is created once in the
//! CLI and passed down explicitly. It carries the verbosity flag and, in
//! tests, captures lines instead of writing to the terminal.

use std::cell::RefCell;

use crate::error::Error;

/// Line-oriented writer for stdout, stderr, and verbose notes.
#[derive(Debug, Default)]
pub struct Console {
    verbose: bool,
    capture: Option<RefCell<Captured>>,
}

#[derive(Debug, Default, Clone)]
pub struct Captured {
    pub out: Vec<String>,
    pub err: Vec<String>,
}

impl Console {
    /// Console writing to the process stdout/stderr.
    pub fn stdio(verbose: bool) -> Self {
        Self {
            verbose,
            capture: None,
        }
    }

    /// Console recording every line in memory.
    pub fn capturing(verbose: bool) -> Self {
        Self {
            verbose,
            capture: Some(RefCell::new(Captured::default())),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn out(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        match &self.capture {
            Some(captured) => captured.borrow_mut().out.push(line.to_string()),
            None => println!("{line}"),
        }
    }

    pub fn err(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        match &self.capture {
            Some(captured) => captured.borrow_mut().err.push(line.to_string()),
            None => eprintln!("{line}"),
        }
    }

    /// Verbose note, shown as `# message` when `--verbose` is active.
    pub fn note(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!("{message}");
        if self.verbose {
            self.out(format!("# {message}"));
        }
    }

    /// Snapshot of captured lines (empty for stdio consoles).
    pub fn captured(&self) -> Captured {
        self.capture
            .as_ref()
            .map(|captured| captured.borrow().clone())
            .unwrap_or_default()
    }
}

/// Print a fatal error with its remediation hints.
pub fn emit_error(console: &Console, err: &Error) {
    match err {
        // Server messages are already user-facing.
        Error::Rejected(message) => console.err(message),
        Error::DetachedHead(repo) | Error::NoUpstream { repo, .. } => {
            console.err(format!("Repository: {}", repo.display()));
            console.err(format!("ERROR: {err}"));
        }
        _ => console.err(format!("ERROR: {err}")),
    }

    for hint in error_next_steps(err) {
        console.err(hint);
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NoUpstream { local_branch, .. } => vec![format!(
            "You can set upstream with\ngit push -u origin {local_branch}"
        )],
        Error::DetachedHead(_) => vec!["Check out a branch before locking files".to_string()],
        Error::MissingIdentity(_) => {
            vec!["Configure it with: git config user.name \"Your Name\"".to_string()]
        }
        Error::SshNotFound => vec!["Install ssh or point GIT_SSH to an ssh client".to_string()],
        Error::InvalidSortKey(_) => {
            vec!["Valid keys: path (p), branch (b), author (a)".to_string()]
        }
        Error::InvalidConfig(_) => vec!["fix .softlock.toml then retry".to_string()],
        Error::TokenBusy(_) => vec!["Retry once the other softlock command has finished".to_string()],
        _ => Vec::new(),
    }
}

//! Exclusive access to the session token file
//!
//! Any softlock run may refresh the cached token, and the pre-commit hook
//! often runs while an artist is locking files in another terminal. Runs
//! serialize on a `<token file>.lock` sibling held through fs2, so only one
//! of them performs the SSH handshake. While holding the guard a run may
//! replace the token file; the new record is renamed into place, so a run
//! that reads without the guard sees either the old record or the new one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// How often a waiting run re-checks the token lock
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lock file guarding `token_file`: `user-data` is guarded by `user-data.lock`.
pub fn lock_path_for(token_file: &Path) -> PathBuf {
    let mut name = token_file
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    token_file.with_file_name(name)
}

fn held_elsewhere(err: &io::Error) -> bool {
    // Windows reports a held lock as ERROR_SHARING_VIOLATION or
    // ERROR_LOCK_VIOLATION instead of WouldBlock.
    err.kind() == io::ErrorKind::WouldBlock
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// Held while a run reads, refreshes, and rewrites the token file.
///
/// Dropping the guard lets the next waiting run in.
pub struct TokenFileGuard {
    lock_file: File,
    token_file: PathBuf,
}

impl TokenFileGuard {
    /// Wait up to `wait` for other runs to finish with `token_file`.
    ///
    /// The token directory is created when missing. Returns
    /// [`Error::TokenBusy`] if another run still holds the lock when the
    /// wait runs out.
    pub fn acquire(token_file: &Path, wait: Duration) -> Result<Self> {
        let lock_path = lock_path_for(token_file);
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let deadline = Instant::now() + wait;
        while let Err(err) = lock_file.try_lock_exclusive() {
            if !held_elsewhere(&err) {
                return Err(Error::Io(err));
            }
            if Instant::now() >= deadline {
                tracing::debug!(lock = %lock_path.display(), "token lock still held");
                return Err(Error::TokenBusy(lock_path));
            }
            thread::sleep(POLL_INTERVAL);
        }

        Ok(Self {
            lock_file,
            token_file: token_file.to_path_buf(),
        })
    }

    /// The token file this guard protects.
    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    /// Replace the token file with `contents`.
    pub fn replace(&self, contents: &str) -> Result<()> {
        let name = self
            .token_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Staged next to the target so the rename never crosses filesystems.
        let staged = self
            .token_file
            .with_file_name(format!(".{name}.{}.new", std::process::id()));

        let mut file = File::create(&staged)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(err) = fs::rename(&staged, &self.token_file) {
            let _ = fs::remove_file(&staged);
            return Err(Error::Io(err));
        }
        Ok(())
    }
}

impl Drop for TokenFileGuard {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

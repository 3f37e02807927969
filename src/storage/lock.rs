//! Store-wide exclusive lock.
//!
//! A lock file inside the git directory carries an OS-level exclusive lock
//! (`fs2`), so transactions started by different processes against the same
//! store never overlap. The lock is released when the guard is dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

/// Poll interval while another process holds the lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process kept the lock until the deadline passed.
    #[error("store is locked by another process: {}", .0.display())]
    AlreadyLocked(PathBuf),

    /// Failed to create or open the lock file.
    #[error("failed to create lock {}: {source}", .path.display())]
    CreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(#[source] std::io::Error),
}

/// An exclusive lock on the store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    /// Try once to take the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::CreateFailed {
                path: path.to_path_buf(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file,
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(LockError::AcquireFailed(e)),
        }
    }

    /// Take the lock, waiting for other holders until `deadline`.
    pub fn acquire_until(path: &Path, deadline: Instant) -> Result<Self, LockError> {
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                debug!(path = %path.display(), "acquired store lock");
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(LockError::AlreadyLocked(path.to_path_buf()));
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // the OS drops the lock with the descriptor anyway
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "released store lock");
    }
}

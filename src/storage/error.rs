//! Storage layer error types
//!
//! Every store operation fails with a `StorageError`. Its `Display` output is the
//! raw diagnostic text handed up to the transaction layer.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// the main error type for store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// the specified branch/ref was not found
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// branch already exists
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// path is a symlink or otherwise not a plain file
    #[error("not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    /// staging produced the same tree as HEAD
    #[error("nothing to commit, staged content matches HEAD")]
    NothingToCommit,

    /// repo is not initialized
    #[error("repository not initialized: {0}")]
    NotInitialized(PathBuf),

    /// repo has no working tree
    #[error("repository is bare: {0}")]
    BareRepository(PathBuf),

    /// repo is empty (no commits)
    #[error("repository is empty: no commits found")]
    EmptyRepository,

    /// invalid branch or path name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// the operation did not finish in time
    #[error("store operation `{operation}` timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// the worker executing store operations is gone
    #[error("store worker is not running")]
    WorkerStopped,

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if the operation was abandoned because it took too long
    pub fn is_timeout(&self) -> bool {
        matches!(self, StorageError::Timeout { .. })
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

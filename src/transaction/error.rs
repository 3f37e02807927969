//! Transaction error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::storage::{LockError, StorageError};
use crate::transaction::conflict::ConflictReporter;
use crate::transaction::outcome::{FailureKind, FailureReason, Outcome};
use crate::transaction::state::{TxEvent, TxState};

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can end a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The target document does not exist or its name is invalid.
    #[error("document not found: {0}")]
    TargetNotFound(String),

    /// Writing, staging or committing the revision failed.
    #[error("commit failed: {0}")]
    CommitFailed(#[source] StorageError),

    /// The side branch could not be merged automatically.
    #[error("merge conflict on paths: {}", paths_display(.paths))]
    MergeConflict {
        /// Diagnostic text reported by the store.
        detail: String,
        paths: Vec<PathBuf>,
    },

    /// Any other store failure, including timeouts.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    /// The store is not on its mainline, so no transaction may start.
    #[error("store is on {}, not on mainline {mainline}", .current.as_deref().unwrap_or("a detached HEAD"))]
    NotOnMainline {
        mainline: String,
        current: Option<String>,
    },

    /// Write access was not granted in time.
    #[error("timed out after {}ms waiting for write access", .0.as_millis())]
    LockTimeout(Duration),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("invalid transition from {from} on {event:?}")]
    InvalidTransition { from: TxState, event: TxEvent },

    /// Restoring the mainline failed; the store needs manual repair.
    #[error("rollback failed after `{cause}`: {source}")]
    RollbackFailed {
        cause: Box<TransactionError>,
        source: StorageError,
    },
}

fn paths_display(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<StorageError> for TransactionError {
    fn from(e: StorageError) -> Self {
        TransactionError::StoreUnavailable(e)
    }
}

impl TransactionError {
    /// Check if submitting the same revision again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransactionError::MergeConflict { .. } | TransactionError::LockTimeout(_) => true,
            TransactionError::StoreUnavailable(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Wrap a failure of the apply or commit step.
    ///
    /// Timeouts and a dead store worker say nothing about the revision itself
    /// and are reported as store failures.
    pub(crate) fn commit_failed(e: StorageError) -> Self {
        match e {
            StorageError::Timeout { .. } | StorageError::WorkerStopped => {
                TransactionError::StoreUnavailable(e)
            }
            e => TransactionError::CommitFailed(e),
        }
    }

    /// The outcome reported to the caller for a transaction ending in this error.
    pub fn into_outcome(self) -> Outcome {
        let kind = match &self {
            TransactionError::TargetNotFound(document) => {
                return Outcome::NotFound {
                    document: document.clone(),
                };
            }
            TransactionError::MergeConflict { detail, .. } => {
                return Outcome::Conflict {
                    report: ConflictReporter::describe(detail),
                };
            }
            TransactionError::CommitFailed(_) => FailureKind::CommitFailed,
            TransactionError::RollbackFailed { .. } => FailureKind::RollbackFailed,
            _ => FailureKind::StoreUnavailable,
        };
        Outcome::Failed {
            reason: FailureReason::new(kind, self.to_string()).retryable(self.is_retryable()),
        }
    }
}

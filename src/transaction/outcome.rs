//! What a caller learns about a submitted revision.

use serde::Serialize;

use crate::storage::CommitId;
use crate::transaction::conflict::ConflictReport;
use crate::transaction::context::Transaction;

/// Result of one revision; exactly one per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The revision is on the mainline.
    Merged { branch: String, head: CommitId },
    /// The merge was rejected; the mainline is unchanged.
    Conflict { report: ConflictReport },
    /// The transaction failed; see the reason.
    Failed { reason: FailureReason },
    /// No such document in the store.
    NotFound { document: String },
}

impl Outcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, Outcome::Merged { .. })
    }

    /// HTTP status an upload endpoint answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Merged { .. } => 200,
            Outcome::Conflict { .. } => 409,
            Outcome::Failed { .. } => 500,
            Outcome::NotFound { .. } => 404,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CommitFailed,
    StoreUnavailable,
    RollbackFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
    /// Set when the store may be inconsistent and must be repaired by hand.
    pub needs_operator: bool,
    /// Submitting the same revision again may succeed.
    pub retryable: bool,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            needs_operator: kind == FailureKind::RollbackFailed,
            retryable: false,
        }
    }

    pub(crate) fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

/// Outcome together with the transaction record, if one was started.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReport {
    pub outcome: Outcome,
    pub transaction: Option<Transaction>,
}

impl TransactionReport {
    /// A revision turned away before any transaction started.
    pub(crate) fn rejected(outcome: Outcome) -> Self {
        Self {
            outcome,
            transaction: None,
        }
    }
}

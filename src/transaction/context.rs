//! The record of one transaction.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::document::{DocumentName, DocumentPath};
use crate::storage::{BranchName, CommitId};
use crate::transaction::error::TransactionResult;
use crate::transaction::state::{TxEvent, TxState};

/// A revision in flight.
///
/// Created once the target is resolved and the mainline commit captured; the
/// coordinator moves it through [`TxState`] and keeps every state it passed
/// through in the trail.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    /// Unique ID: start time in milliseconds plus the document name.
    pub id: String,
    pub document: DocumentName,
    pub path: PathBuf,
    /// Mainline commit the transaction started from and rolls back to.
    pub original_commit: CommitId,
    /// Side branch, reserved at start and created in the first step.
    pub branch: BranchName,
    pub started_at: DateTime<Utc>,
    state: TxState,
    trail: Vec<TxState>,
}

impl Transaction {
    pub(crate) fn new(
        target: DocumentPath,
        original_commit: CommitId,
        branch: BranchName,
        started_at: DateTime<Utc>,
    ) -> Self {
        let id = branch.revision_id().unwrap_or(branch.as_str()).to_string();
        Self {
            id,
            document: target.name,
            path: target.path,
            original_commit,
            branch,
            started_at,
            state: TxState::Start,
            trail: vec![TxState::Start],
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// States visited so far, oldest first.
    pub fn trail(&self) -> &[TxState] {
        &self.trail
    }

    pub(crate) fn advance(&mut self, event: TxEvent) -> TransactionResult<TxState> {
        let next = self.state.next(event)?;
        debug!(tx = %self.id, from = %self.state, to = %next, "transition");
        self.state = next;
        self.trail.push(next);
        Ok(next)
    }

    /// Enter `ErrorRollback` unless the transaction is already heading there.
    pub(crate) fn fail(&mut self) {
        if self.state == TxState::ErrorRollback || self.state == TxState::ConflictDetected {
            return;
        }
        // every other non-terminal state accepts Failed
        let _ = self.advance(TxEvent::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn transaction() -> Transaction {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 5, 3).unwrap();
        let name = DocumentName::new("config.yaml").unwrap();
        let target = DocumentPath {
            path: PathBuf::from("config.yaml"),
            name,
        };
        let commit = CommitId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        Transaction::new(target, commit, BranchName::for_revision("config.yaml", at), at)
    }

    #[test]
    fn test_id_matches_branch() {
        let tx = transaction();
        assert_eq!(tx.id, "20261017-090503000-config.yaml");
        assert_eq!(tx.branch.as_str(), format!("rev/{}", tx.id));
        assert_eq!(tx.state(), TxState::Start);
    }

    #[test]
    fn test_trail_records_transitions() {
        let mut tx = transaction();
        tx.advance(TxEvent::BranchCreated).unwrap();
        tx.advance(TxEvent::Applied).unwrap();
        tx.fail();
        tx.advance(TxEvent::Finish).unwrap();

        assert_eq!(
            tx.trail(),
            &[
                TxState::Start,
                TxState::BranchCreated,
                TxState::Applied,
                TxState::ErrorRollback,
                TxState::Finalized,
            ]
        );
    }

    #[test]
    fn test_invalid_advance_keeps_state() {
        let mut tx = transaction();
        assert!(tx.advance(TxEvent::MergeSucceeded).is_err());
        assert_eq!(tx.state(), TxState::Start);
        assert_eq!(tx.trail().len(), 1);
    }

    #[test]
    fn test_fail_keeps_conflict() {
        let mut tx = transaction();
        for event in [
            TxEvent::BranchCreated,
            TxEvent::Applied,
            TxEvent::Committed,
            TxEvent::MergeStarted,
            TxEvent::MergeConflicted,
        ] {
            tx.advance(event).unwrap();
        }
        tx.fail();
        assert_eq!(tx.state(), TxState::ConflictDetected);
    }
}

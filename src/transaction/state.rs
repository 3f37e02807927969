//! Transaction lifecycle as an explicit state machine.
//!
//! ```text
//! Start ─► BranchCreated ─► Applied ─► Committed ─► MergeAttempted ─┬─► Merged ──────────┐
//!   │            │             │           │              │          └─► ConflictDetected ─┼─► Finalized
//!   └────────────┴─────────────┴───────────┴──────────────┴─────────────► ErrorRollback ───┘
//! ```
//!
//! Every state left through [`TxEvent::Finish`] has exactly one exit action.

use std::fmt;

use serde::Serialize;

use crate::transaction::error::{TransactionError, TransactionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Start,
    BranchCreated,
    Applied,
    Committed,
    MergeAttempted,
    Merged,
    ConflictDetected,
    ErrorRollback,
    Finalized,
}

/// Inputs that move a transaction between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    BranchCreated,
    Applied,
    Committed,
    MergeStarted,
    MergeSucceeded,
    MergeConflicted,
    Failed,
    Finish,
}

/// What must happen when a transaction leaves its final working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    /// Keep the merge and clean up the side branch.
    Finalize,
    /// Restore the mainline to the commit the transaction started from.
    Rollback,
}

impl TxState {
    /// Transition table.
    pub fn next(self, event: TxEvent) -> TransactionResult<TxState> {
        use TxEvent as E;
        use TxState as S;

        let next = match (self, event) {
            (S::Start, E::BranchCreated) => S::BranchCreated,
            (S::BranchCreated, E::Applied) => S::Applied,
            (S::Applied, E::Committed) => S::Committed,
            (S::Committed, E::MergeStarted) => S::MergeAttempted,
            (S::MergeAttempted, E::MergeSucceeded) => S::Merged,
            (S::MergeAttempted, E::MergeConflicted) => S::ConflictDetected,
            // a failed finalize rolls back too
            (s, E::Failed) if !s.is_terminal() && s != S::ErrorRollback => S::ErrorRollback,
            (S::Merged | S::ConflictDetected | S::ErrorRollback, E::Finish) => S::Finalized,
            (from, event) => {
                return Err(TransactionError::InvalidTransition { from, event });
            }
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        self == TxState::Finalized
    }

    pub fn exit_action(self) -> Option<ExitAction> {
        match self {
            TxState::Merged => Some(ExitAction::Finalize),
            TxState::ConflictDetected | TxState::ErrorRollback => Some(ExitAction::Rollback),
            _ => None,
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::Start => "start",
            TxState::BranchCreated => "branch_created",
            TxState::Applied => "applied",
            TxState::Committed => "committed",
            TxState::MergeAttempted => "merge_attempted",
            TxState::Merged => "merged",
            TxState::ConflictDetected => "conflict_detected",
            TxState::ErrorRollback => "error_rollback",
            TxState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

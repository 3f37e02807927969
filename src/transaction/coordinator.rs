//! Transaction coordinator - drives revisions into the store.
//!
//! Each revision runs as one transaction on its own side branch:
//! branch, apply, commit, merge into the mainline, then finalize or roll back.
//! Whatever happens in between, the mainline ends at either the merged revision
//! or exactly the commit the transaction started from.

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::document::{DocumentResolver, ResolveError, Revision};
use crate::storage::{
    BranchName, CommitId, CommitMessage, MergeOutcome, StorageError, StorageResult,
    VersionedStore,
};
use crate::transaction::access::WriteAccess;
use crate::transaction::context::Transaction;
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::options::{BranchRetention, CoordinatorOptions};
use crate::transaction::outcome::{Outcome, TransactionReport};
use crate::transaction::state::{ExitAction, TxEvent, TxState};

/// Highest collision suffix tried for a side branch name.
const MAX_BRANCH_SUFFIX: u32 = 100;

/// Transaction coordinator.
///
/// Owns the store; every transaction runs under exclusive write access, so it
/// can be shared across threads (e.g. behind an `Arc`).
pub struct TransactionCoordinator<S> {
    store: Mutex<S>,
    resolver: DocumentResolver,
    options: CoordinatorOptions,
}

impl<S: VersionedStore> TransactionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, CoordinatorOptions::default())
    }

    pub fn with_options(store: S, options: CoordinatorOptions) -> Self {
        let resolver = match &options.documents_dir {
            Some(dir) => DocumentResolver::with_documents_dir(dir.clone()),
            None => DocumentResolver::new(),
        };
        Self {
            store: Mutex::new(store),
            resolver,
            options,
        }
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    pub fn resolver(&self) -> &DocumentResolver {
        &self.resolver
    }

    /// Submit new content for a document.
    pub fn execute(&self, document: &str, content: &[u8]) -> Outcome {
        self.execute_revision(&Revision::new(document, content)).outcome
    }

    /// Submit a revision and get the transaction record along with the outcome.
    #[instrument(
        skip_all,
        fields(document = %revision.document(), size = revision.content().len())
    )]
    pub fn execute_revision(&self, revision: &Revision) -> TransactionReport {
        let mut access = match WriteAccess::acquire(&self.store, self.options.lock_timeout) {
            Ok(access) => access,
            Err(e) => {
                warn!(error = %e, "write access not granted");
                return TransactionReport::rejected(e.into_outcome());
            }
        };
        let store = &mut *access;

        let mut tx = match self.begin(store, revision) {
            Ok(tx) => tx,
            Err(e) => {
                if matches!(e, TransactionError::TargetNotFound(_)) {
                    info!(error = %e, "revision rejected");
                } else {
                    warn!(error = %e, "transaction not started");
                }
                return TransactionReport::rejected(e.into_outcome());
            }
        };
        info!(
            tx = %tx.id,
            branch = %tx.branch,
            original = %tx.original_commit.short(),
            "transaction started"
        );

        let result = self.run(store, &mut tx, revision);
        let outcome = self.conclude(store, &mut tx, result);
        TransactionReport {
            outcome,
            transaction: Some(tx),
        }
    }

    /// Delete side branches left unmerged by transactions that never finished,
    /// e.g. because the process died. Returns how many were deleted.
    pub fn sweep_abandoned(&self) -> TransactionResult<usize> {
        let mut access = WriteAccess::acquire(&self.store, self.options.lock_timeout)?;
        let store = &mut *access;
        let mainline = store.mainline().clone();

        if let Some(current) = store.current_branch()? {
            if current.is_revision_branch() {
                warn!(branch = %current, "store left on a revision branch, returning to mainline");
                store.checkout(&mainline)?;
            }
        }

        let mut swept = 0;
        for branch in store.list_branches(Some(BranchName::REVISION_PREFIX))? {
            if store.is_merged(&branch)? {
                continue;
            }
            store.delete_branch(&branch)?;
            info!(branch = %branch, "swept abandoned revision branch");
            swept += 1;
        }
        Ok(swept)
    }

    /// Check preconditions and reserve the side branch. Nothing is written yet.
    fn begin(&self, store: &mut S, revision: &Revision) -> TransactionResult<Transaction> {
        let mainline = store.mainline().clone();
        let current = store.current_branch()?;
        if current.as_ref() != Some(&mainline) {
            return Err(TransactionError::NotOnMainline {
                mainline: mainline.to_string(),
                current: current.map(|b| b.to_string()),
            });
        }

        let target = self
            .resolver
            .resolve(store, revision.document())
            .map_err(|e| match e {
                ResolveError::Store(e) => TransactionError::StoreUnavailable(e),
                e => {
                    debug!(error = %e, "document did not resolve");
                    TransactionError::TargetNotFound(revision.document().to_string())
                }
            })?;

        let original_commit = store.current_commit()?;
        let started_at = Utc::now();
        let branch = self.allocate_branch(store, BranchName::for_revision(target.name.as_str(), started_at))?;

        Ok(Transaction::new(target, original_commit, branch, started_at))
    }

    fn allocate_branch(&self, store: &mut S, base: BranchName) -> TransactionResult<BranchName> {
        if !store.branch_exists(&base)? {
            return Ok(base);
        }
        for n in 2..=MAX_BRANCH_SUFFIX {
            let candidate = base.with_suffix(n);
            if !store.branch_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(StorageError::BranchAlreadyExists(base.to_string()).into())
    }

    /// Branch, apply, commit and merge. Returns the new mainline head.
    fn run(&self, store: &mut S, tx: &mut Transaction, revision: &Revision) -> TransactionResult<CommitId> {
        store.create_branch(&tx.branch)?;
        tx.advance(TxEvent::BranchCreated)?;
        store.checkout(&tx.branch)?;

        store
            .write_file(&tx.path, revision.content())
            .map_err(TransactionError::commit_failed)?;
        tx.advance(TxEvent::Applied)?;

        store.stage(&tx.path).map_err(TransactionError::commit_failed)?;
        let message = CommitMessage::revision(tx.document.as_str(), revision.source(), &tx.id);
        let commit = store.commit(&message).map_err(TransactionError::commit_failed)?;
        tx.advance(TxEvent::Committed)?;
        debug!(tx = %tx.id, commit = %commit.short(), "revision committed");

        let mainline = store.mainline().clone();
        store.checkout(&mainline)?;
        tx.advance(TxEvent::MergeStarted)?;

        match store.merge(&tx.branch)? {
            MergeOutcome::Conflict { detail, paths } => {
                tx.advance(TxEvent::MergeConflicted)?;
                Err(TransactionError::MergeConflict { detail, paths })
            }
            MergeOutcome::UpToDate { head }
            | MergeOutcome::FastForward { head }
            | MergeOutcome::Merged { head } => {
                tx.advance(TxEvent::MergeSucceeded)?;
                Ok(head)
            }
        }
    }

    fn conclude(
        &self,
        store: &mut S,
        tx: &mut Transaction,
        result: TransactionResult<CommitId>,
    ) -> Outcome {
        let result = result.and_then(|head| {
            self.finalize(store, tx)?;
            tx.advance(TxEvent::Finish)?;
            Ok(head)
        });

        match result {
            Ok(head) => {
                info!(tx = %tx.id, head = %head.short(), "revision merged");
                Outcome::Merged {
                    branch: tx.branch.to_string(),
                    head,
                }
            }
            Err(cause) => {
                tx.fail();
                self.rollback(store, tx, cause)
            }
        }
    }

    fn finalize(&self, store: &mut S, tx: &Transaction) -> TransactionResult<()> {
        if tx.state().exit_action() != Some(ExitAction::Finalize) {
            return Err(TransactionError::InvalidTransition {
                from: tx.state(),
                event: TxEvent::Finish,
            });
        }
        if self.options.retention == BranchRetention::Delete {
            store.delete_branch(&tx.branch)?;
        }
        Ok(())
    }

    fn rollback(&self, store: &mut S, tx: &mut Transaction, cause: TransactionError) -> Outcome {
        let mut cause = cause;
        if tx.state() == TxState::ConflictDetected {
            if let Err(e) = store.abort_merge() {
                warn!(tx = %tx.id, error = %e, "could not abort pending merge");
                cause = TransactionError::StoreUnavailable(e);
            }
        }

        match self.restore(store, tx) {
            Ok(()) => {
                if let Err(e) = tx.advance(TxEvent::Finish) {
                    warn!(tx = %tx.id, error = %e, "rolled back from unexpected state");
                }
                match &cause {
                    TransactionError::MergeConflict { paths, .. } => {
                        warn!(tx = %tx.id, paths = ?paths, "merge conflict, revision rolled back");
                    }
                    _ => warn!(tx = %tx.id, error = %cause, "transaction failed, rolled back"),
                }
                cause.into_outcome()
            }
            Err(source) => {
                let failure = TransactionError::RollbackFailed {
                    cause: Box::new(cause),
                    source,
                };
                error!(
                    tx = %tx.id,
                    original = %tx.original_commit,
                    branch = %tx.branch,
                    error = %failure,
                    "rollback failed, store needs repair"
                );
                failure.into_outcome()
            }
        }
    }

    /// Put the mainline back at the transaction's original commit and remove
    /// the side branch.
    fn restore(&self, store: &mut S, tx: &Transaction) -> StorageResult<()> {
        let mainline = store.mainline().clone();
        if store.current_branch()?.as_ref() != Some(&mainline) {
            store.checkout(&mainline)?;
        }
        if store.branch_exists(&tx.branch)? {
            store.delete_branch(&tx.branch)?;
        }
        store.reset_hard(tx.original_commit)?;

        let head = store.current_commit()?;
        if head != tx.original_commit {
            return Err(StorageError::Internal(format!(
                "mainline at {} after rollback, expected {}",
                head, tx.original_commit
            )));
        }
        debug!(tx = %tx.id, head = %head.short(), "mainline restored");
        Ok(())
    }
}

impl<S> std::fmt::Debug for TransactionCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("options", &self.options)
            .finish()
    }
}

//! The versioned store contract.
//!
//! The transaction coordinator drives any type implementing [`VersionedStore`].
//! `GitRepository` is the git2-backed implementation; `TimedStore` wraps any
//! store with per-operation timeouts.

use std::path::{Path, PathBuf};

use crate::storage::error::StorageResult;
use crate::storage::lock::StoreLock;
use crate::storage::types::{BranchName, CommitId};

/// Result of merging a side branch into the checked out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The branch was already contained in HEAD.
    UpToDate { head: CommitId },
    /// HEAD moved forward to the branch tip.
    FastForward { head: CommitId },
    /// A merge commit with both parents was created.
    Merged { head: CommitId },
    /// The merge could not be reconciled automatically.
    ///
    /// The store may be left with the merge pending; call
    /// [`VersionedStore::abort_merge`] to clean it up.
    Conflict { detail: String, paths: Vec<PathBuf> },
}

/// Branch/commit/merge primitives over a single working tree and mainline.
///
/// Paths are relative to [`VersionedStore::root`]. Implementations report every
/// failure as a `StorageError` carrying the underlying diagnostic text.
pub trait VersionedStore {
    /// Working tree root.
    fn root(&self) -> &Path;

    /// The mainline branch.
    fn mainline(&self) -> &BranchName;

    /// File used for cross-process exclusion, if the store supports it.
    fn lock_path(&self) -> Option<PathBuf> {
        None
    }

    /// Give up the store lock once every operation issued so far has finished.
    fn release_lock(&mut self, lock: StoreLock) {
        drop(lock);
    }

    /// Commit at the tip of the checked out branch.
    fn current_commit(&mut self) -> StorageResult<CommitId>;

    /// Checked out branch, `None` when HEAD is detached.
    fn current_branch(&mut self) -> StorageResult<Option<BranchName>>;

    /// Whether `path` is a tracked file at the tip of the mainline.
    fn contains(&mut self, path: &Path) -> StorageResult<bool>;

    /// Create `name` at the current commit without checking it out.
    fn create_branch(&mut self, name: &BranchName) -> StorageResult<()>;

    fn branch_exists(&mut self, name: &BranchName) -> StorageResult<bool>;

    /// Local branches whose name starts with `prefix`.
    fn list_branches(&mut self, prefix: Option<&str>) -> StorageResult<Vec<BranchName>>;

    /// Whether the tip of `branch` is reachable from the mainline.
    fn is_merged(&mut self, branch: &BranchName) -> StorageResult<bool>;

    /// Point HEAD at `branch` and force the working tree to match it.
    fn checkout(&mut self, branch: &BranchName) -> StorageResult<()>;

    /// Overwrite a file in the working tree.
    fn write_file(&mut self, path: &Path, content: &[u8]) -> StorageResult<()>;

    /// Stage exactly `path`.
    fn stage(&mut self, path: &Path) -> StorageResult<()>;

    /// Commit the index on the checked out branch.
    fn commit(&mut self, message: &str) -> StorageResult<CommitId>;

    /// Merge `branch` into the checked out branch.
    fn merge(&mut self, branch: &BranchName) -> StorageResult<MergeOutcome>;

    /// Drop any pending merge and restore the working tree to HEAD.
    fn abort_merge(&mut self) -> StorageResult<()>;

    fn delete_branch(&mut self, branch: &BranchName) -> StorageResult<()>;

    /// Move the checked out branch to `commit`, discarding index and working
    /// tree changes.
    fn reset_hard(&mut self, commit: CommitId) -> StorageResult<()>;
}

//!  Branch and reference management.
//!
//!  Git refs are pointers to commits. This module handles:
//! - Mainline initialization
//! - Side branch lifecycle (create, checkout, delete)
//! - Ref resolution and ancestry checks
//!
//! Revision side branches use a namespaced pattern: `rev/{revision_id}`.
//! This makes leftovers from crashed processes easy to find and clean up.

use git2::build::CheckoutBuilder;
use git2::{BranchType, Repository};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Resolve a branch name to its current commit ID.
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Get the commit HEAD points at.
    pub fn head_commit(repo: &Repository) -> StorageResult<CommitId> {
        let head = repo.head().map_err(|e| {
            if e.code() == git2::ErrorCode::UnbornBranch {
                StorageError::EmptyRepository
            } else {
                StorageError::Git(e)
            }
        })?;

        let commit = head.peel_to_commit()?;
        Ok(CommitId::new(commit.id()))
    }

    /// Get the branch HEAD points at, `None` when detached.
    pub fn current_branch(repo: &Repository) -> StorageResult<Option<BranchName>> {
        if repo.head_detached()? {
            return Ok(None);
        }
        let head = repo.head()?;
        match head.shorthand() {
            Some(name) => Ok(Some(BranchName::new(name)?)),
            None => Err(StorageError::Internal("HEAD name is not valid UTF-8".to_string())),
        }
    }

    /// Check if a branch exists.
    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        if Self::branch_exists(repo, branch) {
            return Err(StorageError::BranchAlreadyExists(branch.to_string()));
        }

        let commit = repo.find_commit(target.raw())?;
        repo.branch(branch.as_str(), &commit, false)?;

        Ok(())
    }

    /// Point HEAD at `branch` and force the working tree and index to match.
    pub fn checkout_branch(repo: &Repository, branch: &BranchName) -> StorageResult<()> {
        if !Self::branch_exists(repo, branch) {
            return Err(StorageError::RefNotFound(branch.to_string()));
        }

        repo.set_head(&branch.as_ref_path())?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;

        Ok(())
    }

    /// Delete a branch.
    ///
    /// Git refuses to delete the checked out branch.
    pub fn delete_branch(repo: &Repository, branch: &BranchName) -> StorageResult<()> {
        let mut git_branch = repo
            .find_branch(branch.as_str(), BranchType::Local)
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        git_branch.delete()?;

        Ok(())
    }

    /// List all branches with an optional prefix filter.
    pub fn list_branches(repo: &Repository, prefix: Option<&str>) -> StorageResult<Vec<BranchName>> {
        let branches = repo.branches(Some(BranchType::Local))?;

        let mut result = Vec::new();
        for branch_result in branches {
            let (branch, _) = branch_result?;
            if let Some(name) = branch.name()? {
                let matches = match prefix {
                    Some(p) => name.starts_with(p),
                    None => true,
                };
                if matches {
                    if let Ok(branch_name) = BranchName::new(name) {
                        result.push(branch_name);
                    }
                }
            }
        }

        Ok(result)
    }

    /// Whether the tip of `branch` is reachable from `into`.
    pub fn is_merged_into(repo: &Repository, branch: &BranchName, into: &BranchName) -> StorageResult<bool> {
        let tip = Self::resolve_branch(repo, branch)?;
        let base = Self::resolve_branch(repo, into)?;

        if tip == base {
            return Ok(true);
        }
        Ok(repo.graph_descendant_of(base.raw(), tip.raw())?)
    }

    /// Initialize the mainline if it doesn't exist and point HEAD at it.
    ///
    /// This should be called after creating the initial commit.
    pub fn init_mainline(repo: &Repository, mainline: &BranchName, initial_commit: CommitId) -> StorageResult<()> {
        if !Self::branch_exists(repo, mainline) {
            Self::create_branch(repo, mainline, initial_commit)?;
        }

        repo.set_head(&mainline.as_ref_path())?;

        Ok(())
    }
}

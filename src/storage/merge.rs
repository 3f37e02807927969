//! Merging side branches into the checked out branch.
//!
//! Mirrors `git merge <branch>`: fast-forward when HEAD is an ancestor of the
//! branch, otherwise a three-way merge into the index and working tree. When
//! the index ends up with conflicts the merge is left pending and the outcome
//! carries `git`-style diagnostics.

use std::path::PathBuf;

use git2::build::CheckoutBuilder;
use git2::{IndexConflict, Repository, ResetType};

use crate::storage::commit::{self, CommitMessage};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::store::MergeOutcome;
use crate::storage::types::{BranchName, CommitId, GitSignature};

/// Merge `branch` into whatever HEAD points at.
pub(crate) fn merge_branch(
    repo: &Repository,
    branch: &BranchName,
    signature: &GitSignature,
) -> StorageResult<MergeOutcome> {
    let reference = repo
        .find_reference(&branch.as_ref_path())
        .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;
    let theirs = repo.reference_to_annotated_commit(&reference)?;
    let (analysis, _) = repo.merge_analysis(&[&theirs])?;

    if analysis.is_up_to_date() {
        return Ok(MergeOutcome::UpToDate {
            head: RefManager::head_commit(repo)?,
        });
    }

    let head = repo.head()?;
    let head_name = head
        .name()
        .ok_or_else(|| StorageError::Internal("HEAD name is not valid UTF-8".to_string()))?
        .to_string();

    if analysis.is_fast_forward() {
        let mut head_ref = repo.find_reference(&head_name)?;
        head_ref.set_target(theirs.id(), &format!("fast-forward to {}", branch))?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        return Ok(MergeOutcome::FastForward {
            head: CommitId::new(theirs.id()),
        });
    }

    if !analysis.is_normal() {
        return Err(StorageError::Internal(format!(
            "cannot merge {}: unsupported merge analysis {:?}",
            branch, analysis
        )));
    }

    let ours = CommitId::new(head.peel_to_commit()?.id());
    let mut checkout = CheckoutBuilder::new();
    checkout.safe().allow_conflicts(true).conflict_style_merge(true);
    repo.merge(&[&theirs], None, Some(&mut checkout))?;

    let mut index = repo.index()?;
    if index.has_conflicts() {
        let paths = conflicting_paths(index.conflicts()?.collect::<Result<Vec<_>, _>>()?);
        return Ok(MergeOutcome::Conflict {
            detail: conflict_detail(&paths),
            paths,
        });
    }

    let tree_id = index.write_tree()?;
    let mainline = head.shorthand().unwrap_or("HEAD").to_string();
    let merged = commit::write_commit(
        repo,
        tree_id,
        &[ours, CommitId::new(theirs.id())],
        &CommitMessage::merge(branch.as_str(), &mainline),
        signature,
        Some("HEAD"),
    )?;
    repo.cleanup_state()?;

    Ok(MergeOutcome::Merged { head: merged })
}

/// Drop a pending merge and make index and working tree match HEAD again.
pub(crate) fn abort_merge(repo: &Repository) -> StorageResult<()> {
    repo.cleanup_state()?;
    let head = repo.head()?.peel_to_commit()?;
    repo.reset(
        head.as_object(),
        ResetType::Hard,
        Some(CheckoutBuilder::new().force()),
    )?;
    Ok(())
}

fn conflicting_paths(conflicts: Vec<IndexConflict>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = conflicts
        .into_iter()
        .filter_map(|c| c.our.or(c.their).or(c.ancestor))
        .map(|entry| PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()))
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Render conflicts the way `git merge` reports them.
fn conflict_detail(paths: &[PathBuf]) -> String {
    let mut detail = String::new();
    for path in paths {
        detail.push_str(&format!(
            "CONFLICT (content): Merge conflict in {}\n",
            path.display()
        ));
    }
    detail.push_str("Automatic merge failed; fix conflicts and then commit the result.");
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_detail_format() {
        let detail = conflict_detail(&[PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]);
        let lines: Vec<_> = detail.lines().collect();
        assert_eq!(lines[0], "CONFLICT (content): Merge conflict in a.yaml");
        assert_eq!(lines[1], "CONFLICT (content): Merge conflict in b.yaml");
        assert!(lines[2].starts_with("Automatic merge failed"));
    }
}

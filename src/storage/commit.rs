//! Commits and the mainline audit log.
//!
//! Every accepted revision reaches the mainline either as its own commit
//! (fast-forward) or through a two-parent merge commit. Walking the mainline
//! along first parents therefore lists exactly the accepted changes, newest
//! first. Commit messages carry a bracketed tag so the log can be classified
//! without looking at trees.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, Sort};
use serde::Serialize;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{CommitId, GitSignature};

const INIT_TAG: &str = "[gitdoc]";
const REVISION_TAG: &str = "[REVISION]";
const MERGE_TAG: &str = "[MERGE]";

/// What produced a commit, read from its message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    Init,
    Revision,
    Merge,
    /// Written outside gitdoc, e.g. seeded by hand.
    External,
}

impl CommitKind {
    fn of(message: &str) -> Self {
        if message.starts_with(REVISION_TAG) {
            CommitKind::Revision
        } else if message.starts_with(MERGE_TAG) {
            CommitKind::Merge
        } else if message.starts_with(INIT_TAG) {
            CommitKind::Init
        } else {
            CommitKind::External
        }
    }
}

/// One entry of the mainline log.
#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parents: Vec<CommitId>,
    pub kind: CommitKind,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let message = commit.message().unwrap_or("").to_string();
        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            parents: commit.parent_ids().map(CommitId::new).collect(),
            kind: CommitKind::of(&message),
            author: commit.author().name().unwrap_or("unknown").to_string(),
            message,
            timestamp,
        }
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Transaction that committed this revision, if gitdoc wrote it.
    pub fn transaction(&self) -> Option<&str> {
        if self.kind != CommitKind::Revision {
            return None;
        }
        self.summary().rsplit_once(" tx:").map(|(_, id)| id)
    }
}

/// Write a commit of `tree` on top of `parents`, moving `update_ref` to it.
pub(crate) fn write_commit(
    repo: &Repository,
    tree: Oid,
    parents: &[CommitId],
    message: &str,
    signature: &GitSignature,
    update_ref: Option<&str>,
) -> StorageResult<CommitId> {
    let tree = repo.find_tree(tree)?;
    let sig = signature.to_git2_signature()?;
    let parents = parents
        .iter()
        .map(|id| repo.find_commit(id.raw()))
        .collect::<Result<Vec<_>, _>>()?;
    let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();

    let oid = repo.commit(update_ref, &sig, &sig, message, &tree, &parents)?;
    Ok(CommitId::new(oid))
}

pub(crate) fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;
    Ok(CommitInfo::from_git2(&commit))
}

/// Parentless commit with an empty tree, not attached to any ref.
pub(crate) fn create_initial_commit(repo: &Repository, signature: &GitSignature) -> StorageResult<CommitId> {
    let tree = repo.treebuilder(None)?.write()?;
    write_commit(repo, tree, &[], CommitMessage::INIT, signature, None)
}

/// Walk first parents back from `start`, newest first.
pub(crate) fn mainline_log(
    repo: &Repository,
    start: CommitId,
    limit: Option<usize>,
) -> StorageResult<Vec<CommitInfo>> {
    let mut walk = repo.revwalk()?;
    walk.push(start.raw())?;
    walk.simplify_first_parent()?;
    walk.set_sorting(Sort::TOPOLOGICAL)?;

    walk.take(limit.unwrap_or(usize::MAX))
        .map(|oid| -> StorageResult<CommitInfo> {
            let commit = repo.find_commit(oid?)?;
            Ok(CommitInfo::from_git2(&commit))
        })
        .collect()
}

/// Message formats for gitdoc commits.
pub struct CommitMessage;

impl CommitMessage {
    pub const INIT: &'static str = "[gitdoc] Initialize repository";

    /// Revision committed on its side branch.
    pub fn revision(document: &str, source: Option<&str>, tx_id: &str) -> String {
        match source {
            Some(source) => format!("{} {} from {} tx:{}", REVISION_TAG, document, source, tx_id),
            None => format!("{} {} tx:{}", REVISION_TAG, document, tx_id),
        }
    }

    /// Side branch merged into the mainline.
    pub fn merge(branch: &str, mainline: &str) -> String {
        format!("{} {} into {}", MERGE_TAG, branch, mainline)
    }
}

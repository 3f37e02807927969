//!   Core Git repository wrapper.
//!
//!  This is the central component of the storage layer. It wraps `git2::Repository`
//!  with thread-safe access and implements [`VersionedStore`] on top of the
//!  working tree, index and refs of a non-bare repository.
//!
//! All other storage modules use this for Git access.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::build::CheckoutBuilder;
use git2::{ObjectType, Repository, ResetType};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::commit::{self, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::merge;
use crate::storage::refs::RefManager;
use crate::storage::store::{MergeOutcome, VersionedStore};
use crate::storage::types::{BranchName, CommitId, GitSignature};

/// Name of the lock file created inside the git directory.
const LOCK_FILE: &str = "gitdoc.lock";

/// Tree entry modes of plain files; links and submodules are not documents.
const REGULAR_FILE_MODES: [i32; 2] = [0o100644, 0o100755];

/// The main Git repository wrapper.
///
/// Clone this to share across threads - it uses Arc internally. Clones share
/// one repository handle, so reads from a clone see the same refs.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    repo: Mutex<Repository>,
    workdir: PathBuf,
    git_dir: PathBuf,
    mainline: BranchName,
    signature: GitSignature,
}

impl GitRepository {
    /// Open an existing repository whose mainline is `main`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with(path, BranchName::main(), GitSignature::gitdoc())
    }

    /// Open an existing repository with an explicit mainline and commit identity.
    pub fn open_with(
        path: impl AsRef<Path>,
        mainline: BranchName,
        signature: GitSignature,
    ) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;

        if !RefManager::branch_exists(&repo, &mainline) {
            return Err(StorageError::RefNotFound(mainline.to_string()));
        }

        info!(path = %path.display(), mainline = %mainline, "opened document store");
        Self::wrap(repo, path, mainline, signature)
    }

    /// Initialize a new repository with an empty root commit on `main`.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::init_with(path, BranchName::main(), GitSignature::gitdoc())
    }

    /// Initialize a new repository with an explicit mainline and commit identity.
    pub fn init_with(
        path: impl AsRef<Path>,
        mainline: BranchName,
        signature: GitSignature,
    ) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;

        let commit_id = commit::create_initial_commit(&repo, &signature)?;
        RefManager::init_mainline(&repo, &mainline, commit_id)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;

        info!(path = %path.display(), mainline = %mainline, "initialized document store");
        Self::wrap(repo, path, mainline, signature)
    }

    /// Open or initialize a repository.
    pub fn open_or_init(
        path: impl AsRef<Path>,
        mainline: BranchName,
        signature: GitSignature,
    ) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open_with(path, mainline, signature)
        } else {
            Self::init_with(path, mainline, signature)
        }
    }

    fn wrap(
        repo: Repository,
        path: &Path,
        mainline: BranchName,
        signature: GitSignature,
    ) -> StorageResult<Self> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| StorageError::BareRepository(path.to_path_buf()))?
            .to_path_buf();
        let git_dir = repo.path().to_path_buf();

        Ok(Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                workdir,
                git_dir,
                mainline,
                signature,
            }),
        })
    }

    /// Get the working tree path.
    pub fn path(&self) -> &Path {
        &self.inner.workdir
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Read-only Queries ====================

    /// Get the commit HEAD points at.
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::head_commit)
    }

    /// Get the commit ID for a branch.
    pub fn resolve_branch(&self, branch: &BranchName) -> StorageResult<CommitId> {
        self.with_repo(|repo| RefManager::resolve_branch(repo, branch))
    }

    /// Tip of the mainline.
    pub fn mainline_head(&self) -> StorageResult<CommitId> {
        self.resolve_branch(&self.inner.mainline)
    }

    /// Get information about a commit.
    pub fn get_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// First-parent history from `from`, newest first.
    pub fn history(&self, from: CommitId, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| commit::mainline_log(repo, from, limit))
    }

    /// Read a file as committed at the tip of `branch`.
    ///
    /// Returns `None` if the path is not a tracked regular file there.
    pub fn read_file(&self, branch: &BranchName, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        self.with_repo(|repo| {
            let tip = RefManager::resolve_branch(repo, branch)?;
            let tree = repo.find_commit(tip.raw())?.tree()?;
            let entry = match tree.get_path(path) {
                Ok(entry) => entry,
                Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if entry.kind() != Some(ObjectType::Blob)
                || !REGULAR_FILE_MODES.contains(&entry.filemode())
            {
                return Ok(None);
            }
            let blob = repo.find_blob(entry.id())?;
            Ok(Some(blob.content().to_vec()))
        })
    }

    /// List all branches.
    pub fn list_all_branches(&self) -> StorageResult<Vec<BranchName>> {
        self.with_repo(|repo| RefManager::list_branches(repo, None))
    }

    /// Whether a merge or other operation is left pending.
    pub fn is_clean_state(&self) -> StorageResult<bool> {
        self.with_repo(|repo| Ok(repo.state() == git2::RepositoryState::Clean))
    }

    /// Commit a file straight onto the checked out branch.
    ///
    /// Used to seed stores; revisions go through the transaction coordinator.
    pub fn commit_file(&mut self, path: &Path, content: &[u8], message: &str) -> StorageResult<CommitId> {
        self.write_file(path, content)?;
        self.stage(path)?;
        self.commit(message)
    }

    /// Absolute path of `path`, refusing to go through any symlink on the way.
    fn absolute(&self, path: &Path) -> StorageResult<PathBuf> {
        let mut target = self.inner.workdir.clone();
        for component in path.components() {
            target.push(component);
            match fs::symlink_metadata(&target) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(StorageError::NotRegularFile(path.to_path_buf()));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.inner.workdir.join(path))
    }
}

impl VersionedStore for GitRepository {
    fn root(&self) -> &Path {
        &self.inner.workdir
    }

    fn mainline(&self) -> &BranchName {
        &self.inner.mainline
    }

    fn lock_path(&self) -> Option<PathBuf> {
        Some(self.inner.git_dir.join(LOCK_FILE))
    }

    fn current_commit(&mut self) -> StorageResult<CommitId> {
        self.head()
    }

    fn current_branch(&mut self) -> StorageResult<Option<BranchName>> {
        self.with_repo(RefManager::current_branch)
    }

    fn contains(&mut self, path: &Path) -> StorageResult<bool> {
        let mainline = self.inner.mainline.clone();
        Ok(self.read_file(&mainline, path)?.is_some())
    }

    fn create_branch(&mut self, name: &BranchName) -> StorageResult<()> {
        self.with_repo(|repo| {
            let head = RefManager::head_commit(repo)?;
            RefManager::create_branch(repo, name, head)?;
            debug!(branch = %name, at = %head.short(), "created branch");
            Ok(())
        })
    }

    fn branch_exists(&mut self, name: &BranchName) -> StorageResult<bool> {
        self.with_repo(|repo| Ok(RefManager::branch_exists(repo, name)))
    }

    fn list_branches(&mut self, prefix: Option<&str>) -> StorageResult<Vec<BranchName>> {
        self.with_repo(|repo| RefManager::list_branches(repo, prefix))
    }

    fn is_merged(&mut self, branch: &BranchName) -> StorageResult<bool> {
        self.with_repo(|repo| RefManager::is_merged_into(repo, branch, &self.inner.mainline))
    }

    fn checkout(&mut self, branch: &BranchName) -> StorageResult<()> {
        self.with_repo(|repo| RefManager::checkout_branch(repo, branch))?;
        debug!(branch = %branch, "checked out");
        Ok(())
    }

    fn write_file(&mut self, path: &Path, content: &[u8]) -> StorageResult<()> {
        let target = self.absolute(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        Ok(())
    }

    fn stage(&mut self, path: &Path) -> StorageResult<()> {
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            index.add_path(path)?;
            index.write()?;
            Ok(())
        })
    }

    fn commit(&mut self, message: &str) -> StorageResult<CommitId> {
        let signature = self.inner.signature.clone();
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            let tree_id = index.write_tree()?;
            let parent = RefManager::head_commit(repo)?;

            if repo.find_commit(parent.raw())?.tree_id() == tree_id {
                return Err(StorageError::NothingToCommit);
            }

            let id = commit::write_commit(repo, tree_id, &[parent], message, &signature, Some("HEAD"))?;
            debug!(commit = %id.short(), "committed");
            Ok(id)
        })
    }

    fn merge(&mut self, branch: &BranchName) -> StorageResult<MergeOutcome> {
        let signature = self.inner.signature.clone();
        self.with_repo(|repo| merge::merge_branch(repo, branch, &signature))
    }

    fn abort_merge(&mut self) -> StorageResult<()> {
        self.with_repo(merge::abort_merge)
    }

    fn delete_branch(&mut self, branch: &BranchName) -> StorageResult<()> {
        self.with_repo(|repo| RefManager::delete_branch(repo, branch))?;
        debug!(branch = %branch, "deleted branch");
        Ok(())
    }

    fn reset_hard(&mut self, commit: CommitId) -> StorageResult<()> {
        self.with_repo(|repo| {
            let target = repo
                .find_object(commit.raw(), Some(ObjectType::Commit))
                .map_err(|_| StorageError::CommitNotFound(commit.to_string()))?;
            repo.reset(&target, ResetType::Hard, Some(CheckoutBuilder::new().force()))?;
            repo.cleanup_state()?;
            Ok(())
        })?;
        debug!(commit = %commit.short(), "reset hard");
        Ok(())
    }
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("workdir", &self.inner.workdir)
            .field("mainline", &self.inner.mainline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let mut repo = GitRepository::init(dir.path()).unwrap();
        repo.commit_file(Path::new("config.yaml"), b"a: 1\n", "seed").unwrap();
        (dir, repo)
    }

    fn read_main(repo: &GitRepository, path: &str) -> Option<String> {
        repo.read_file(&BranchName::main(), Path::new(path))
            .unwrap()
            .map(|b| String::from_utf8(b).unwrap())
    }

    #[test]
    fn test_init_and_open() {
        let dir = TempDir::new().unwrap();

        let repo = GitRepository::init(dir.path()).unwrap();
        let head1 = repo.head().unwrap();

        drop(repo);
        let repo = GitRepository::open(dir.path()).unwrap();
        let head2 = repo.head().unwrap();

        assert_eq!(head1, head2);
    }

    #[test]
    fn test_open_missing_mainline() {
        let dir = TempDir::new().unwrap();
        GitRepository::init(dir.path()).unwrap();

        let result = GitRepository::open_with(
            dir.path(),
            BranchName::new("trunk").unwrap(),
            GitSignature::gitdoc(),
        );
        assert!(matches!(result, Err(StorageError::RefNotFound(_))));
    }

    #[test]
    fn test_open_or_init() {
        let dir = TempDir::new().unwrap();

        let repo1 = GitRepository::open_or_init(dir.path(), BranchName::main(), GitSignature::gitdoc()).unwrap();
        let head1 = repo1.head().unwrap();

        drop(repo1);
        let repo2 = GitRepository::open_or_init(dir.path(), BranchName::main(), GitSignature::gitdoc()).unwrap();
        assert_eq!(head1, repo2.head().unwrap());
    }

    #[test]
    fn test_contains_tracks_mainline() {
        let (_dir, mut repo) = setup();

        assert!(repo.contains(Path::new("config.yaml")).unwrap());
        assert!(!repo.contains(Path::new("missing.yaml")).unwrap());

        // an untracked file in the working tree does not count
        repo.write_file(Path::new("untracked.yaml"), b"x").unwrap();
        assert!(!repo.contains(Path::new("untracked.yaml")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_documents() {
        let (_dir, mut repo) = setup();
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.yaml");
        std::fs::write(&secret, "s: 1\n").unwrap();

        std::os::unix::fs::symlink(&secret, repo.path().join("link.yaml")).unwrap();
        repo.stage(Path::new("link.yaml")).unwrap();
        repo.commit("track link").unwrap();

        assert!(!repo.contains(Path::new("link.yaml")).unwrap());
        assert_eq!(read_main(&repo, "link.yaml"), None);
        assert!(matches!(
            repo.write_file(Path::new("link.yaml"), b"changed"),
            Err(StorageError::NotRegularFile(_))
        ));

        // a linked directory on the way is refused too
        std::os::unix::fs::symlink(outside.path(), repo.path().join("docs")).unwrap();
        assert!(matches!(
            repo.write_file(Path::new("docs/secret.yaml"), b"changed"),
            Err(StorageError::NotRegularFile(_))
        ));
        assert_eq!(std::fs::read_to_string(&secret).unwrap(), "s: 1\n");
    }

    #[test]
    fn test_commit_unchanged_fails() {
        let (_dir, mut repo) = setup();
        repo.write_file(Path::new("config.yaml"), b"a: 1\n").unwrap();
        repo.stage(Path::new("config.yaml")).unwrap();

        let result = repo.commit("[REVISION] config.yaml tx:1");
        assert!(matches!(result, Err(StorageError::NothingToCommit)));
    }

    #[test]
    fn test_fast_forward_merge() {
        let (_dir, mut repo) = setup();
        let branch = BranchName::new("rev/1-config.yaml").unwrap();

        repo.create_branch(&branch).unwrap();
        repo.checkout(&branch).unwrap();
        let tip = repo.commit_file(Path::new("config.yaml"), b"a: 2\n", "change").unwrap();
        repo.checkout(&BranchName::main()).unwrap();

        let outcome = repo.merge(&branch).unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward { head: tip });
        assert_eq!(read_main(&repo, "config.yaml").as_deref(), Some("a: 2\n"));
        assert_eq!(
            std::fs::read_to_string(repo.path().join("config.yaml")).unwrap(),
            "a: 2\n"
        );
    }

    #[test]
    fn test_three_way_merge() {
        let (_dir, mut repo) = setup();
        repo.commit_file(Path::new("other.yaml"), b"b: 1\n", "seed other").unwrap();
        let branch = BranchName::new("rev/1-config.yaml").unwrap();

        repo.create_branch(&branch).unwrap();
        repo.checkout(&branch).unwrap();
        repo.commit_file(Path::new("config.yaml"), b"a: 2\n", "side").unwrap();
        repo.checkout(&BranchName::main()).unwrap();
        repo.commit_file(Path::new("other.yaml"), b"b: 2\n", "main").unwrap();

        let outcome = repo.merge(&branch).unwrap();
        let head = match outcome {
            MergeOutcome::Merged { head } => head,
            other => panic!("expected merge commit, got {:?}", other),
        };
        assert!(repo.get_commit(head).unwrap().is_merge());
        assert_eq!(read_main(&repo, "config.yaml").as_deref(), Some("a: 2\n"));
        assert_eq!(read_main(&repo, "other.yaml").as_deref(), Some("b: 2\n"));
        assert!(repo.is_clean_state().unwrap());
    }

    #[test]
    fn test_conflicting_merge_and_abort() {
        let (_dir, mut repo) = setup();
        let before = repo.head().unwrap();
        let branch = BranchName::new("rev/1-config.yaml").unwrap();

        repo.create_branch(&branch).unwrap();
        repo.checkout(&branch).unwrap();
        repo.commit_file(Path::new("config.yaml"), b"a: 3\n", "side").unwrap();
        repo.checkout(&BranchName::main()).unwrap();
        let main_tip = repo.commit_file(Path::new("config.yaml"), b"a: 4\n", "main").unwrap();
        assert_ne!(before, main_tip);

        let outcome = repo.merge(&branch).unwrap();
        match &outcome {
            MergeOutcome::Conflict { detail, paths } => {
                assert_eq!(paths, &vec![PathBuf::from("config.yaml")]);
                assert!(detail.contains("Merge conflict in config.yaml"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(!repo.is_clean_state().unwrap());

        repo.abort_merge().unwrap();
        assert!(repo.is_clean_state().unwrap());
        assert_eq!(repo.head().unwrap(), main_tip);
        assert_eq!(
            std::fs::read_to_string(repo.path().join("config.yaml")).unwrap(),
            "a: 4\n"
        );
    }

    #[test]
    fn test_reset_hard_restores_commit() {
        let (_dir, mut repo) = setup();
        let original = repo.head().unwrap();

        repo.commit_file(Path::new("config.yaml"), b"a: 9\n", "later").unwrap();
        repo.write_file(Path::new("config.yaml"), b"dirty").unwrap();

        repo.reset_hard(original).unwrap();
        assert_eq!(repo.head().unwrap(), original);
        assert_eq!(
            std::fs::read_to_string(repo.path().join("config.yaml")).unwrap(),
            "a: 1\n"
        );
    }

    #[test]
    fn test_history() {
        let (_dir, mut repo) = setup();
        let head = repo.commit_file(Path::new("config.yaml"), b"a: 2\n", "second").unwrap();

        let history = repo.history(head, Some(10)).unwrap();
        assert_eq!(history.len(), 3); // init + seed + second
        assert_eq!(history[0].id, head);
        assert_eq!(history[0].summary(), "second");
    }
}

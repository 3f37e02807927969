//! Test stores for driving the coordinator end to end.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use gitdoc::storage::{
    BranchName, CommitId, GitRepository, MergeOutcome, StorageError, StorageResult,
    VersionedStore,
};
use tempfile::TempDir;

/// A fresh store with `config.yaml = "a: 1\n"` on the mainline.
pub fn seeded_repo() -> (TempDir, GitRepository) {
    let dir = TempDir::new().unwrap();
    let mut repo = GitRepository::init(dir.path()).unwrap();
    repo.commit_file(Path::new("config.yaml"), b"a: 1\n", "seed config").unwrap();
    (dir, repo)
}

pub fn mainline_content(repo: &GitRepository, path: &str) -> Option<String> {
    repo.read_file(&BranchName::main(), Path::new(path))
        .unwrap()
        .map(|bytes| String::from_utf8(bytes).unwrap())
}

pub fn revision_branches(repo: &GitRepository) -> Vec<BranchName> {
    repo.list_all_branches()
        .unwrap()
        .into_iter()
        .filter(|b| b.is_revision_branch())
        .collect()
}

/// Runs before every store operation.
pub trait Probe: Send + 'static {
    fn before(&mut self, _op: &'static str, _store: &mut GitRepository) -> StorageResult<()> {
        Ok(())
    }
}

/// Records which thread ran each operation.
#[derive(Clone, Default)]
pub struct Recorder {
    pub log: Arc<Mutex<Vec<(ThreadId, &'static str)>>>,
}

impl Probe for Recorder {
    fn before(&mut self, op: &'static str, _store: &mut GitRepository) -> StorageResult<()> {
        self.log.lock().unwrap().push((thread::current().id(), op));
        // widen the window for interleaving
        thread::sleep(Duration::from_millis(1));
        Ok(())
    }
}

/// Another writer that commits to the mainline right before the next merge.
#[derive(Clone, Default)]
pub struct Interferer {
    pub armed: Arc<AtomicBool>,
    pub path: PathBuf,
    pub content: Vec<u8>,
}

impl Interferer {
    pub fn new(path: &str, content: &str) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(false)),
            path: PathBuf::from(path),
            content: content.as_bytes().to_vec(),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl Probe for Interferer {
    fn before(&mut self, op: &'static str, store: &mut GitRepository) -> StorageResult<()> {
        if op == "merge" && self.armed.swap(false, Ordering::SeqCst) {
            store.commit_file(&self.path, &self.content, "concurrent edit")?;
        }
        Ok(())
    }
}

/// Stalls one operation.
pub struct Hang {
    pub op: &'static str,
    pub delay: Duration,
}

impl Probe for Hang {
    fn before(&mut self, op: &'static str, _store: &mut GitRepository) -> StorageResult<()> {
        if op == self.op {
            thread::sleep(self.delay);
        }
        Ok(())
    }
}

/// Fails one operation.
pub struct Fail {
    pub op: &'static str,
}

impl Probe for Fail {
    fn before(&mut self, op: &'static str, _store: &mut GitRepository) -> StorageResult<()> {
        if op == self.op {
            return Err(StorageError::Internal(format!("{} refused", op)));
        }
        Ok(())
    }
}

/// Fails the first call of one operation only.
pub struct FailOnce {
    pub op: &'static str,
    pub fired: bool,
}

impl FailOnce {
    pub fn new(op: &'static str) -> Self {
        Self { op, fired: false }
    }
}

impl Probe for FailOnce {
    fn before(&mut self, op: &'static str, _store: &mut GitRepository) -> StorageResult<()> {
        if op == self.op && !self.fired {
            self.fired = true;
            return Err(StorageError::Internal(format!("{} refused", op)));
        }
        Ok(())
    }
}

/// Runs both probes, first to last.
impl<A: Probe, B: Probe> Probe for (A, B) {
    fn before(&mut self, op: &'static str, store: &mut GitRepository) -> StorageResult<()> {
        self.0.before(op, store)?;
        self.1.before(op, store)
    }
}

/// A git store with a probe in front of every operation.
pub struct ProbeStore<P> {
    pub inner: GitRepository,
    pub probe: P,
}

impl<P: Probe> ProbeStore<P> {
    pub fn new(inner: GitRepository, probe: P) -> Self {
        Self { inner, probe }
    }

    fn hook(&mut self, op: &'static str) -> StorageResult<()> {
        self.probe.before(op, &mut self.inner)
    }
}

impl<P: Probe> VersionedStore for ProbeStore<P> {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn mainline(&self) -> &BranchName {
        self.inner.mainline()
    }

    fn lock_path(&self) -> Option<PathBuf> {
        self.inner.lock_path()
    }

    fn current_commit(&mut self) -> StorageResult<CommitId> {
        self.hook("current_commit")?;
        self.inner.current_commit()
    }

    fn current_branch(&mut self) -> StorageResult<Option<BranchName>> {
        self.hook("current_branch")?;
        self.inner.current_branch()
    }

    fn contains(&mut self, path: &Path) -> StorageResult<bool> {
        self.hook("contains")?;
        self.inner.contains(path)
    }

    fn create_branch(&mut self, name: &BranchName) -> StorageResult<()> {
        self.hook("create_branch")?;
        self.inner.create_branch(name)
    }

    fn branch_exists(&mut self, name: &BranchName) -> StorageResult<bool> {
        self.hook("branch_exists")?;
        self.inner.branch_exists(name)
    }

    fn list_branches(&mut self, prefix: Option<&str>) -> StorageResult<Vec<BranchName>> {
        self.hook("list_branches")?;
        self.inner.list_branches(prefix)
    }

    fn is_merged(&mut self, branch: &BranchName) -> StorageResult<bool> {
        self.hook("is_merged")?;
        self.inner.is_merged(branch)
    }

    fn checkout(&mut self, branch: &BranchName) -> StorageResult<()> {
        self.hook("checkout")?;
        self.inner.checkout(branch)
    }

    fn write_file(&mut self, path: &Path, content: &[u8]) -> StorageResult<()> {
        self.hook("write_file")?;
        self.inner.write_file(path, content)
    }

    fn stage(&mut self, path: &Path) -> StorageResult<()> {
        self.hook("stage")?;
        self.inner.stage(path)
    }

    fn commit(&mut self, message: &str) -> StorageResult<CommitId> {
        self.hook("commit")?;
        self.inner.commit(message)
    }

    fn merge(&mut self, branch: &BranchName) -> StorageResult<MergeOutcome> {
        self.hook("merge")?;
        self.inner.merge(branch)
    }

    fn abort_merge(&mut self) -> StorageResult<()> {
        self.hook("abort_merge")?;
        self.inner.abort_merge()
    }

    fn delete_branch(&mut self, branch: &BranchName) -> StorageResult<()> {
        self.hook("delete_branch")?;
        self.inner.delete_branch(branch)
    }

    fn reset_hard(&mut self, commit: CommitId) -> StorageResult<()> {
        self.hook("reset_hard")?;
        self.inner.reset_hard(commit)
    }
}

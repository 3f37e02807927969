//! Operation timeouts for store backends.
//!
//! libgit2 calls block the calling thread with no way to cancel them. A
//! [`TimedStore`] moves the inner store onto a dedicated worker thread and
//! waits for each operation at most `timeout`. On expiry the caller gets
//! [`StorageError::Timeout`]; the worker keeps running the stuck operation and
//! every later operation queues behind it, bounded by the same timeout.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::lock::StoreLock;
use crate::storage::store::{MergeOutcome, VersionedStore};
use crate::storage::types::{BranchName, CommitId};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A [`VersionedStore`] whose operations are bounded by a timeout.
pub struct TimedStore<S> {
    jobs: Sender<Job<S>>,
    timeout: Duration,
    root: PathBuf,
    mainline: BranchName,
    lock_path: Option<PathBuf>,
}

impl<S> TimedStore<S>
where
    S: VersionedStore + Send + 'static,
{
    /// Move `store` onto a worker thread.
    pub fn spawn(store: S, timeout: Duration) -> StorageResult<Self> {
        let root = store.root().to_path_buf();
        let mainline = store.mainline().clone();
        let lock_path = store.lock_path();

        let (jobs, queue) = mpsc::channel::<Job<S>>();
        thread::Builder::new()
            .name("gitdoc-store".to_string())
            .spawn(move || {
                let mut store = store;
                for job in queue {
                    job(&mut store);
                }
                debug!("store worker stopped");
            })?;

        Ok(Self {
            jobs,
            timeout,
            root,
            mainline,
            lock_path,
        })
    }

    fn call<T, F>(&self, operation: &'static str, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> StorageResult<T> + Send + 'static,
    {
        let (reply, result) = mpsc::sync_channel(1);
        self.jobs
            .send(Box::new(move |store: &mut S| {
                // the caller may have given up already
                let _ = reply.send(f(store));
            }))
            .map_err(|_| StorageError::WorkerStopped)?;

        match result.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "store operation timed out");
                Err(StorageError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(StorageError::WorkerStopped),
        }
    }
}

impl<S> VersionedStore for TimedStore<S>
where
    S: VersionedStore + Send + 'static,
{
    fn root(&self) -> &Path {
        &self.root
    }

    fn mainline(&self) -> &BranchName {
        &self.mainline
    }

    fn lock_path(&self) -> Option<PathBuf> {
        self.lock_path.clone()
    }

    fn release_lock(&mut self, lock: StoreLock) {
        // queued behind any operation still running, so the store stays
        // locked until the worker is idle
        let queued = self.jobs.send(Box::new(move |_: &mut S| {
            drop(lock);
            debug!("store lock released by worker");
        }));
        if queued.is_err() {
            debug!("store worker gone, lock released");
        }
    }

    fn current_commit(&mut self) -> StorageResult<CommitId> {
        self.call("current_commit", |store| store.current_commit())
    }

    fn current_branch(&mut self) -> StorageResult<Option<BranchName>> {
        self.call("current_branch", |store| store.current_branch())
    }

    fn contains(&mut self, path: &Path) -> StorageResult<bool> {
        let path = path.to_path_buf();
        self.call("contains", move |store| store.contains(&path))
    }

    fn create_branch(&mut self, name: &BranchName) -> StorageResult<()> {
        let name = name.clone();
        self.call("create_branch", move |store| store.create_branch(&name))
    }

    fn branch_exists(&mut self, name: &BranchName) -> StorageResult<bool> {
        let name = name.clone();
        self.call("branch_exists", move |store| store.branch_exists(&name))
    }

    fn list_branches(&mut self, prefix: Option<&str>) -> StorageResult<Vec<BranchName>> {
        let prefix = prefix.map(str::to_string);
        self.call("list_branches", move |store| store.list_branches(prefix.as_deref()))
    }

    fn is_merged(&mut self, branch: &BranchName) -> StorageResult<bool> {
        let branch = branch.clone();
        self.call("is_merged", move |store| store.is_merged(&branch))
    }

    fn checkout(&mut self, branch: &BranchName) -> StorageResult<()> {
        let branch = branch.clone();
        self.call("checkout", move |store| store.checkout(&branch))
    }

    fn write_file(&mut self, path: &Path, content: &[u8]) -> StorageResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();
        self.call("write_file", move |store| store.write_file(&path, &content))
    }

    fn stage(&mut self, path: &Path) -> StorageResult<()> {
        let path = path.to_path_buf();
        self.call("stage", move |store| store.stage(&path))
    }

    fn commit(&mut self, message: &str) -> StorageResult<CommitId> {
        let message = message.to_string();
        self.call("commit", move |store| store.commit(&message))
    }

    fn merge(&mut self, branch: &BranchName) -> StorageResult<MergeOutcome> {
        let branch = branch.clone();
        self.call("merge", move |store| store.merge(&branch))
    }

    fn abort_merge(&mut self) -> StorageResult<()> {
        self.call("abort_merge", |store| store.abort_merge())
    }

    fn delete_branch(&mut self, branch: &BranchName) -> StorageResult<()> {
        let branch = branch.clone();
        self.call("delete_branch", move |store| store.delete_branch(&branch))
    }

    fn reset_hard(&mut self, commit: CommitId) -> StorageResult<()> {
        self.call("reset_hard", move |store| store.reset_hard(commit))
    }
}

impl<S> std::fmt::Debug for TimedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedStore")
            .field("root", &self.root)
            .field("timeout", &self.timeout)
            .finish()
    }
}

//! Exclusive write access to the store.
//!
//! In-process writers are serialized by the coordinator's mutex. Stores that
//! report a lock path additionally get an OS file lock, which keeps writers in
//! other processes out. Both are held by one guard and released when it drops.
//! The file lock is handed back through [`VersionedStore::release_lock`], so a
//! store still busy with an abandoned operation keeps other processes out
//! until that operation ends.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::storage::{LockError, StoreLock, VersionedStore};
use crate::transaction::error::{TransactionError, TransactionResult};

/// Scoped write access; derefs to the store.
pub struct WriteAccess<'a, S: VersionedStore> {
    file_lock: Option<StoreLock>,
    store: MutexGuard<'a, S>,
}

impl<'a, S: VersionedStore> WriteAccess<'a, S> {
    /// Wait up to `timeout` in total for both locks.
    pub(crate) fn acquire(store: &'a Mutex<S>, timeout: Duration) -> TransactionResult<Self> {
        let deadline = Instant::now() + timeout;

        let store = store
            .try_lock_for(timeout)
            .ok_or(TransactionError::LockTimeout(timeout))?;

        let file_lock = match store.lock_path() {
            Some(path) => match StoreLock::acquire_until(&path, deadline) {
                Ok(lock) => Some(lock),
                Err(LockError::AlreadyLocked(_)) => return Err(TransactionError::LockTimeout(timeout)),
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        debug!("write access granted");
        Ok(Self { file_lock, store })
    }
}

impl<S: VersionedStore> Deref for WriteAccess<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S: VersionedStore> DerefMut for WriteAccess<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S: VersionedStore> Drop for WriteAccess<'_, S> {
    fn drop(&mut self) {
        if let Some(lock) = self.file_lock.take() {
            self.store.release_lock(lock);
        }
        debug!("write access released");
    }
}

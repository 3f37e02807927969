//! storage layer for gitdoc
//!
//! this module is the only place that talks to git. The transaction layer sees
//! a document store through the [`VersionedStore`] trait and never touches
//! git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  VersionedStore (trait)                     │
//! │   branch / checkout / write / stage / commit / merge / reset│
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//!        ┌─────────────────┐           ┌──────────────────┐
//!        │  GitRepository  │◄──────────│    TimedStore    │
//!        │ (working tree)  │  worker   │ (per-op timeout) │
//!        └─────────────────┘  thread   └──────────────────┘
//!                 │
//!     ┌───────────┼───────────┐
//!     ▼           ▼           ▼
//!  ┌──────┐   ┌────────┐  ┌────────┐
//!  │ refs │   │ commit │  │ merge  │
//!  └──────┘   └────────┘  └────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use gitdoc::storage::{BranchName, GitRepository, VersionedStore};
//!
//! let mut repo = GitRepository::open_or_init("./docs", BranchName::main(), Default::default())?;
//! let branch = BranchName::new("rev/example")?;
//!
//! repo.create_branch(&branch)?;
//! repo.checkout(&branch)?;
//! repo.write_file("config.yaml".as_ref(), b"a: 2\n")?;
//! repo.stage("config.yaml".as_ref())?;
//! repo.commit("[REVISION] config.yaml")?;
//!
//! repo.checkout(&BranchName::main())?;
//! let outcome = repo.merge(&branch)?;
//! ```

mod commit;
mod error;
mod lock;
mod merge;
mod refs;
mod repository;
mod store;
mod timed;
mod types;

// Re-export public API
pub use commit::{CommitInfo, CommitKind, CommitMessage};
pub use error::{StorageError, StorageResult};
pub use lock::{LockError, StoreLock};
pub use repository::GitRepository;
pub use store::{MergeOutcome, VersionedStore};
pub use timed::TimedStore;
pub use types::{BranchName, CommitId, GitSignature, InvalidNameError};

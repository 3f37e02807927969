//! Transaction management for gitdoc.
//!
//! Every revision is applied as a transaction on its own side branch
//! (`rev/{timestamp}-{document}`). A clean merge lands it on the mainline; a
//! conflict or any error rolls the mainline back to the commit the transaction
//! started from.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TransactionCoordinator                      │
//! │   (write access, branch → commit → merge → finalize/undo)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Transaction │       │   TxState   │       │  Conflict   │
//!  │  (record)   │       │ (machine)   │       │  Reporter   │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gitdoc::storage::GitRepository;
//! use gitdoc::transaction::{Outcome, TransactionCoordinator};
//!
//! let coordinator = TransactionCoordinator::new(GitRepository::open("./docs")?);
//!
//! match coordinator.execute("config.yaml", b"a: 2\n") {
//!     Outcome::Merged { branch, .. } => println!("merged {branch}"),
//!     Outcome::Conflict { report } => println!("rejected: {}", report.summary),
//!     other => println!("{other:?}"),
//! }
//! ```

mod access;
mod conflict;
mod context;
mod coordinator;
mod error;
mod options;
mod outcome;
mod state;

pub use access::WriteAccess;
pub use conflict::{ConflictReport, ConflictReporter};
pub use context::Transaction;
pub use coordinator::TransactionCoordinator;
pub use error::{TransactionError, TransactionResult};
pub use options::{BranchRetention, CoordinatorOptions};
pub use outcome::{FailureKind, FailureReason, Outcome, TransactionReport};
pub use state::{ExitAction, TxEvent, TxState};

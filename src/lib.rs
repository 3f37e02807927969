//! gitdoc - transactional document versioning on git
//!
//! Each new revision of a document is applied on its own side branch,
//! committed, and merged into the mainline. A conflict or any failure on the
//! way rolls the mainline back to exactly where it was, so the mainline only
//! ever moves by whole, merged revisions.
//!
//! # Example
//!
//! ```no_run
//! use gitdoc::service::{Versioner, VersionerConfig};
//! use gitdoc::transaction::Outcome;
//!
//! let versioner = Versioner::open_with_config(VersionerConfig::new("./docs")).unwrap();
//! match versioner.version("config.yaml", b"a: 2\n") {
//!     Outcome::Merged { branch, .. } => println!("merged via {branch}"),
//!     Outcome::Conflict { report } => println!("conflict: {}", report.summary),
//!     other => println!("{other:?}"),
//! }
//! ```

pub mod document;
pub mod service;
pub mod storage;
pub mod transaction;

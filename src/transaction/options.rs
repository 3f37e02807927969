//! Coordinator tuning knobs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens to a side branch after its revision is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchRetention {
    /// Delete the branch once the merge is on the mainline.
    #[default]
    Delete,
    /// Leave merged branches in place.
    Keep,
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Bound on waiting for write access.
    pub lock_timeout: Duration,
    pub retention: BranchRetention,
    /// Directory below the store root holding the documents.
    pub documents_dir: Option<PathBuf>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(30),
            retention: BranchRetention::Delete,
            documents_dir: None,
        }
    }
}

impl CoordinatorOptions {
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn retention(mut self, retention: BranchRetention) -> Self {
        self.retention = retention;
        self
    }

    pub fn documents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.documents_dir = Some(dir.into());
        self
    }
}

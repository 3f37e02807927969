//! TOML configuration for the versioning service.
//!
//! ```toml
//! repository = "versioning_directory"
//! mainline = "main"
//! documents_dir = "docs"
//! create_if_missing = false
//! branch_retention = "delete"
//! lock_timeout_secs = 30
//! operation_timeout_secs = 60
//! sweep_on_open = true
//! log_level = "info"
//!
//! [signature]
//! name = "gitdoc"
//! email = "gitdoc@localhost"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::service::api::{ServiceError, ServiceResult};
use crate::storage::{BranchName, GitSignature};
use crate::transaction::{BranchRetention, CoordinatorOptions};

/// Service configuration. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionerConfig {
    /// Working tree of the document store.
    pub repository: PathBuf,
    /// Mainline branch name.
    pub mainline: String,
    /// Directory below the store root that holds the documents.
    pub documents_dir: Option<PathBuf>,
    /// Initialize the store when it does not exist yet.
    pub create_if_missing: bool,
    pub branch_retention: BranchRetention,
    /// Seconds to wait for write access.
    pub lock_timeout_secs: u64,
    /// Seconds any single store operation may take.
    pub operation_timeout_secs: u64,
    /// Delete abandoned revision branches when the store is opened.
    pub sweep_on_open: bool,
    /// Tracing filter used by the binary (trace, debug, info, warn, error).
    pub log_level: String,
    pub signature: SignatureConfig,
}

/// Identity recorded on revision and merge commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub name: String,
    pub email: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        let signature = GitSignature::gitdoc();
        Self {
            name: signature.name,
            email: signature.email,
        }
    }
}

impl SignatureConfig {
    pub fn to_signature(&self) -> GitSignature {
        GitSignature::new(&self.name, &self.email)
    }
}

impl Default for VersionerConfig {
    fn default() -> Self {
        Self {
            repository: PathBuf::from("versioning_directory"),
            mainline: BranchName::MAIN.to_string(),
            documents_dir: None,
            create_if_missing: false,
            branch_retention: BranchRetention::Delete,
            lock_timeout_secs: 30,
            operation_timeout_secs: 60,
            sweep_on_open: true,
            log_level: "info".to_string(),
            signature: SignatureConfig::default(),
        }
    }
}

impl VersionerConfig {
    /// Create a new configuration for the store at `repository`.
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            ..Default::default()
        }
    }

    /// Load a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        let contents = std::fs::read_to_string(path).map_err(|source| ServiceError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ServiceError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    pub fn repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository = path.into();
        self
    }

    pub fn mainline(mut self, name: impl Into<String>) -> Self {
        self.mainline = name.into();
        self
    }

    pub fn documents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.documents_dir = Some(dir.into());
        self
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn branch_retention(mut self, retention: BranchRetention) -> Self {
        self.branch_retention = retention;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_secs = timeout.as_secs();
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_secs = timeout.as_secs();
        self
    }

    /// Set sweep_on_open flag.
    pub fn sweep_on_open(mut self, value: bool) -> Self {
        self.sweep_on_open = value;
        self
    }

    pub fn signature(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.signature = SignatureConfig {
            name: name.into(),
            email: email.into(),
        };
        self
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.lock_timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "lock_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "operation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.mainline_branch()?;
        if self.signature.name.trim().is_empty() || self.signature.email.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "signature name and email must not be empty".to_string(),
            ));
        }
        if let Some(dir) = &self.documents_dir {
            if dir.is_absolute() {
                return Err(ServiceError::InvalidConfig(format!(
                    "documents_dir must be relative to the repository: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn mainline_branch(&self) -> ServiceResult<BranchName> {
        BranchName::new(self.mainline.as_str()).map_err(|e| {
            ServiceError::InvalidConfig(format!("invalid mainline {:?}: {}", self.mainline, e))
        })
    }

    pub fn lock_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn operation_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        let options = CoordinatorOptions::default()
            .lock_timeout(self.lock_timeout_duration())
            .retention(self.branch_retention);
        match &self.documents_dir {
            Some(dir) => options.documents_dir(dir.clone()),
            None => options,
        }
    }
}

//! Versioner API - high-level interface for gitdoc.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::document::{DocumentName, Revision};
use crate::service::config::VersionerConfig;
use crate::storage::{
    CommitInfo, GitRepository, InvalidNameError, StorageError, TimedStore, VersionedStore,
};
use crate::transaction::{Outcome, TransactionCoordinator, TransactionError, TransactionReport};

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("invalid document name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("store already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read config file {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The versioning service.
///
/// Revisions go through the transaction coordinator on a timed store; reads use
/// a second handle on the same repository.
pub struct Versioner {
    config: VersionerConfig,
    repo: GitRepository,
    coordinator: TransactionCoordinator<TimedStore<GitRepository>>,
}

impl Versioner {
    /// Open an existing store with default settings.
    pub fn open(path: impl AsRef<Path>) -> ServiceResult<Self> {
        Self::open_with_config(VersionerConfig::new(path.as_ref()))
    }

    /// Open the configured store, creating it if allowed.
    pub fn open_with_config(config: VersionerConfig) -> ServiceResult<Self> {
        config.validate()?;
        let mainline = config.mainline_branch()?;
        let signature = config.signature.to_signature();

        let repo = if is_store(&config.repository) {
            GitRepository::open_with(&config.repository, mainline, signature)?
        } else if config.create_if_missing {
            GitRepository::init_with(&config.repository, mainline, signature)?
        } else {
            return Err(ServiceError::StoreNotFound(config.repository.clone()));
        };

        Self::start(config, repo)
    }

    /// Create a new store; fails if one already exists.
    pub fn init(config: VersionerConfig) -> ServiceResult<Self> {
        config.validate()?;
        if is_store(&config.repository) {
            return Err(ServiceError::AlreadyExists(config.repository.clone()));
        }
        let repo = GitRepository::init_with(
            &config.repository,
            config.mainline_branch()?,
            config.signature.to_signature(),
        )?;
        Self::start(config, repo)
    }

    fn start(config: VersionerConfig, repo: GitRepository) -> ServiceResult<Self> {
        let store = TimedStore::spawn(repo.clone(), config.operation_timeout_duration())?;
        let coordinator = TransactionCoordinator::with_options(store, config.coordinator_options());
        let versioner = Self {
            config,
            repo,
            coordinator,
        };

        if versioner.config.sweep_on_open {
            let swept = versioner.coordinator.sweep_abandoned()?;
            if swept > 0 {
                info!(swept, "removed abandoned revision branches");
            }
        }
        Ok(versioner)
    }

    /// Submit new content for an existing document.
    pub fn version(&self, document: &str, content: &[u8]) -> Outcome {
        self.coordinator.execute(document, content)
    }

    pub fn version_revision(&self, revision: &Revision) -> TransactionReport {
        self.coordinator.execute_revision(revision)
    }

    /// Submit a file as the new content of the document named after it, or of
    /// `name` when given.
    pub fn version_file(&self, file: &Path, name: Option<&str>) -> ServiceResult<TransactionReport> {
        let content = std::fs::read(file)?;
        let document = match name {
            Some(name) => name.to_string(),
            None => DocumentName::from_file_name(file)?.to_string(),
        };
        let revision = Revision::new(document, content).with_source(file.display().to_string());
        Ok(self.coordinator.execute_revision(&revision))
    }

    /// Current mainline content of a document.
    pub fn read_document(&self, name: &str) -> ServiceResult<Vec<u8>> {
        let name = DocumentName::new(name)?;
        let path = self.coordinator.resolver().path_for(&name);
        self.repo
            .read_file(self.repo.mainline(), &path)?
            .ok_or_else(|| ServiceError::DocumentNotFound(name.to_string()))
    }

    /// Mainline history, newest first.
    pub fn history(&self, limit: Option<usize>) -> ServiceResult<Vec<CommitInfo>> {
        let head = self.repo.mainline_head()?;
        Ok(self.repo.history(head, limit)?)
    }

    /// Delete abandoned revision branches.
    pub fn sweep(&self) -> ServiceResult<usize> {
        Ok(self.coordinator.sweep_abandoned()?)
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    /// Get the configuration.
    pub fn config(&self) -> &VersionerConfig {
        &self.config
    }
}

impl std::fmt::Debug for Versioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Versioner")
            .field("repository", &self.config.repository)
            .field("mainline", &self.config.mainline)
            .finish()
    }
}

fn is_store(path: &Path) -> bool {
    path.join(".git").exists()
}

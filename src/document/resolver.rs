//! Mapping document names to tracked paths in the store.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::document::{DocumentName, DocumentPath};
use crate::storage::{InvalidNameError, StorageError, VersionedStore};

/// Errors from resolving a document.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid document name {name:?}: {source}")]
    InvalidName {
        name: String,
        source: InvalidNameError,
    },

    /// The name is valid but no such document is tracked on the mainline.
    #[error("document not found: {0}")]
    NotFound(DocumentName),

    #[error(transparent)]
    Store(#[from] StorageError),
}

impl ResolveError {
    /// The offending name, for reporting.
    pub fn document(&self) -> Option<String> {
        match self {
            ResolveError::InvalidName { name, .. } => Some(name.clone()),
            ResolveError::NotFound(name) => Some(name.to_string()),
            ResolveError::Store(_) => None,
        }
    }
}

/// Resolves document names against the mainline of a store.
///
/// Only documents that already exist can be versioned; the resolver never
/// creates anything.
#[derive(Debug, Clone, Default)]
pub struct DocumentResolver {
    documents_dir: Option<PathBuf>,
}

impl DocumentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look documents up below `dir` instead of the store root.
    pub fn with_documents_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: Some(dir.into()),
        }
    }

    /// Path a document would have, without checking that it exists.
    pub fn path_for(&self, name: &DocumentName) -> PathBuf {
        match &self.documents_dir {
            Some(dir) => dir.join(name.as_str()),
            None => PathBuf::from(name.as_str()),
        }
    }

    pub fn resolve<S>(&self, store: &mut S, name: &str) -> Result<DocumentPath, ResolveError>
    where
        S: VersionedStore + ?Sized,
    {
        let name = DocumentName::new(name).map_err(|source| ResolveError::InvalidName {
            name: name.to_string(),
            source,
        })?;
        let path = self.path_for(&name);

        if !store.contains(&path)? {
            return Err(ResolveError::NotFound(name));
        }

        debug!(document = %name, path = %path.display(), "resolved document");
        Ok(DocumentPath { name, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GitRepository;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let mut repo = GitRepository::init(dir.path()).unwrap();
        repo.commit_file(Path::new("config.yaml"), b"a: 1\n", "seed").unwrap();
        repo.commit_file(Path::new("docs/guide.md"), b"# guide\n", "seed docs").unwrap();
        (dir, repo)
    }

    #[test]
    fn test_resolve_existing() {
        let (_dir, mut repo) = setup();
        let resolved = DocumentResolver::new().resolve(&mut repo, "config.yaml").unwrap();
        assert_eq!(resolved.name.as_str(), "config.yaml");
        assert_eq!(resolved.path, PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_resolve_missing() {
        let (_dir, mut repo) = setup();
        let result = DocumentResolver::new().resolve(&mut repo, "absent.yaml");
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
    }

    #[test]
    fn test_resolve_invalid_name() {
        let (_dir, mut repo) = setup();
        let result = DocumentResolver::new().resolve(&mut repo, "../config.yaml");
        let err = result.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidName { .. }));
        assert_eq!(err.document().as_deref(), Some("../config.yaml"));
    }

    #[test]
    fn test_resolve_in_documents_dir() {
        let (_dir, mut repo) = setup();
        let resolver = DocumentResolver::with_documents_dir("docs");

        let resolved = resolver.resolve(&mut repo, "guide.md").unwrap();
        assert_eq!(resolved.path, PathBuf::from("docs/guide.md"));

        // the root-level file is outside the documents directory
        let result = resolver.resolve(&mut repo, "config.yaml");
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
    }

    #[test]
    fn test_untracked_file_is_not_a_document() {
        let (_dir, mut repo) = setup();
        repo.write_file(Path::new("draft.yaml"), b"x").unwrap();
        let result = DocumentResolver::new().resolve(&mut repo, "draft.yaml");
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
    }
}

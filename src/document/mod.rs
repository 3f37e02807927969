//! Documents and revisions.
//!
//! A document lives in the store under a flat, validated name. A revision is the
//! new content for one document, submitted as a single transaction.

mod resolver;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::storage::InvalidNameError;

pub use resolver::{DocumentResolver, ResolveError};

/// A validated document name.
///
/// Names form a flat namespace: no path separators, no control characters, no
/// leading `.`, at most 255 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentName(String);

impl DocumentName {
    /// Maximum length in bytes.
    pub const MAX_LEN: usize = 255;

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();

        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }
        if name == "." || name == ".." {
            return Err(InvalidNameError::Reserved(name));
        }
        if name.starts_with('.') {
            return Err(InvalidNameError::InvalidStart('.'));
        }
        for (position, c) in name.chars().enumerate() {
            if c == '/' || c == '\\' || c.is_control() {
                return Err(InvalidNameError::InvalidCharacter { char: c, position });
            }
        }

        Ok(Self(name))
    }

    /// Derive the name from an uploaded file path: its final component.
    pub fn from_file_name(path: impl AsRef<Path>) -> Result<Self, InvalidNameError> {
        let file_name = path
            .as_ref()
            .file_name()
            .ok_or(InvalidNameError::Empty)?
            .to_string_lossy()
            .into_owned();
        Self::new(file_name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A document resolved to its location in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    pub name: DocumentName,
    /// Path relative to the store root.
    pub path: PathBuf,
}

/// New content for one document.
#[derive(Debug, Clone)]
pub struct Revision {
    document: String,
    content: Vec<u8>,
    source: Option<String>,
}

impl Revision {
    pub fn new(document: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            document: document.into(),
            content: content.into(),
            source: None,
        }
    }

    /// Record where the content came from, e.g. the uploaded file path.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Target document name as submitted, not yet validated.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_name_valid() {
        assert!(DocumentName::new("config.yaml").is_ok());
        assert!(DocumentName::new("my doc (1).txt").is_ok());
        assert!(DocumentName::new("a").is_ok());
    }

    #[test]
    fn test_document_name_invalid() {
        assert_eq!(DocumentName::new(""), Err(InvalidNameError::Empty));
        assert!(matches!(DocumentName::new(".."), Err(InvalidNameError::Reserved(_))));
        assert_eq!(DocumentName::new(".hidden"), Err(InvalidNameError::InvalidStart('.')));
        assert_eq!(
            DocumentName::new("dir/config.yaml"),
            Err(InvalidNameError::InvalidCharacter { char: '/', position: 3 })
        );
        assert!(DocumentName::new("tab\there").is_err());
        assert!(matches!(
            DocumentName::new("x".repeat(256)),
            Err(InvalidNameError::TooLong(256))
        ));
    }

    #[test]
    fn test_document_name_from_file_name() {
        let name = DocumentName::from_file_name("/tmp/uploads/config.yaml").unwrap();
        assert_eq!(name.as_str(), "config.yaml");

        assert!(DocumentName::from_file_name("/").is_err());
    }

    #[test]
    fn test_revision_source() {
        let revision = Revision::new("config.yaml", "a: 2\n");
        assert_eq!(revision.source(), None);

        let revision = revision.with_source("uploads/config.yaml");
        assert_eq!(revision.source(), Some("uploads/config.yaml"));
        assert_eq!(revision.content(), b"a: 2\n");
    }
}

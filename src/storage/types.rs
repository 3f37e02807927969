//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;

use chrono::{DateTime, Utc};
use git2::{ObjectType, Oid};
use serde::{Serialize, Serializer};

/// This makes sure we don't accidentally pass a tree or blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// A branch name, with special handling for revision side branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// default mainline branch name
    pub const MAIN: &'static str = "main";

    /// prefix for revision side branches
    pub const REVISION_PREFIX: &'static str = "rev/";

    /// create a new BranchName, checked against git's ref format rules
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if !git2::Reference::is_valid_name(&format!("refs/heads/{}", name)) {
            return Err(InvalidNameError::InvalidRef(name));
        }
        Ok(Self(name))
    }

    /// create the default mainline reference
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// Build the side branch name for a revision of `document` started at `at`.
    ///
    /// Format: `rev/{yyyymmdd-HHMMSSmmm}-{document}`. Characters git refuses in
    /// ref names are replaced by `-`.
    pub fn for_revision(document: &str, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}{}",
            Self::REVISION_PREFIX,
            revision_id(document, at)
        ))
    }

    /// append a collision suffix (`-2`, `-3`, ...)
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{}", self.0, n))
    }

    /// check if this is a revision side branch
    pub fn is_revision_branch(&self) -> bool {
        self.0.starts_with(Self::REVISION_PREFIX)
    }

    /// extract the revision id if this is a side branch
    pub fn revision_id(&self) -> Option<&str> {
        self.0.strip_prefix(Self::REVISION_PREFIX)
    }

    /// get the full ref path (e.g., "refs/heads/main")
    pub fn as_ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by a transaction and its side branch:
/// millisecond timestamp followed by the ref-safe document name.
pub(crate) fn revision_id(document: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", at.format("%Y%m%d-%H%M%S%3f"), ref_safe(document))
}

/// Longest document part of a revision branch name. With the timestamp, a
/// collision suffix and git's `.lock` file, the ref file name stays well under
/// the 255-byte limit of common filesystems.
const MAX_REF_DOCUMENT: usize = 200;

/// Rewrite `name` so it can be embedded in a git ref.
///
/// Names longer than [`MAX_REF_DOCUMENT`] are cut and end with a short hash of
/// the full name, so distinct documents keep distinct branches.
fn ref_safe(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    while out.contains("..") {
        out = out.replace("..", ".");
    }
    let trimmed = out.trim_matches('.');
    let mut out = if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    };
    if out.len() > MAX_REF_DOCUMENT {
        let digest = Oid::hash_object(ObjectType::Blob, name.as_bytes())
            .map(|oid| oid.to_string()[..8].to_string())
            .unwrap_or_default();
        out.truncate(MAX_REF_DOCUMENT - 1 - digest.len());
        out.push('-');
        out.push_str(&digest);
    }
    if out.ends_with(".lock") {
        out.push('-');
    }
    out
}

/// git signature (author/committer info)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// default signature for gitdoc commits
    pub fn gitdoc() -> Self {
        Self::new("gitdoc", "gitdoc@localhost")
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::gitdoc()
    }
}

/// error type for invalid names (documents, branches)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
    Reserved(String),
    InvalidRef(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} bytes", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character {:?} at position {}", char, position)
            }
            Self::Reserved(name) => write!(f, "'{}' is a reserved name", name),
            Self::InvalidRef(name) => write!(f, "'{}' is not a valid git ref name", name),
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 5, 3).unwrap()
            + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn test_branch_name_revision() {
        let branch = BranchName::for_revision("config.yaml", at());
        assert_eq!(branch.as_str(), "rev/20261017-090503042-config.yaml");
        assert!(branch.is_revision_branch());
        assert_eq!(branch.revision_id(), Some("20261017-090503042-config.yaml"));
        assert_eq!(branch.as_ref_path(), "refs/heads/rev/20261017-090503042-config.yaml");
    }

    #[test]
    fn test_branch_name_sanitizes_document() {
        let branch = BranchName::for_revision("my doc~1..yaml", at());
        assert_eq!(branch.as_str(), "rev/20261017-090503042-my-doc-1.yaml");
        assert!(BranchName::new(branch.as_str()).is_ok());

        let branch = BranchName::for_revision("state.lock", at());
        assert!(BranchName::new(branch.as_str()).is_ok());
    }

    #[test]
    fn test_branch_name_caps_long_documents() {
        let first = format!("{}a.yaml", "d".repeat(240));
        let second = format!("{}b.yaml", "d".repeat(240));

        let branch = BranchName::for_revision(&first, at()).with_suffix(100);
        let file_name = branch.revision_id().unwrap();
        assert!(file_name.len() + ".lock".len() <= 255, "{}", file_name.len());
        assert!(BranchName::new(branch.as_str()).is_ok());

        assert_ne!(
            BranchName::for_revision(&first, at()),
            BranchName::for_revision(&second, at())
        );
        // short names are left alone
        assert_eq!(
            BranchName::for_revision("a.yaml", at()).as_str(),
            "rev/20261017-090503042-a.yaml"
        );
    }

    #[test]
    fn test_branch_name_suffix() {
        let branch = BranchName::for_revision("a.yaml", at()).with_suffix(2);
        assert!(branch.as_str().ends_with("a.yaml-2"));
    }

    #[test]
    fn test_branch_name_main() {
        let branch = BranchName::main();
        assert!(!branch.is_revision_branch());
        assert_eq!(branch.revision_id(), None);
        assert_eq!(branch.as_ref_path(), "refs/heads/main");
    }

    #[test]
    fn test_branch_name_invalid() {
        assert!(BranchName::new("").is_err());
        assert!(BranchName::new("a..b").is_err());
        assert!(BranchName::new("has space").is_err());
        assert!(BranchName::new("trailing/").is_err());
        assert!(BranchName::new("master").is_ok());
    }
}

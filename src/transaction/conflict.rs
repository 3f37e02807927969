//! Turning raw merge diagnostics into a report for the submitter.

use std::path::PathBuf;

use serde::Serialize;

const CONFLICT_MARKER: &str = "Merge conflict in ";
const FALLBACK_SUMMARY: &str = "merge rejected by store";

/// A rejected merge, described for humans and machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    /// One line describing the conflict.
    pub summary: String,
    /// Diagnostic text exactly as the store reported it.
    pub raw_detail: String,
    /// Paths the store named as conflicting, in order of appearance.
    pub paths: Vec<PathBuf>,
}

pub struct ConflictReporter;

impl ConflictReporter {
    /// Build a report from the store's diagnostic text.
    pub fn describe(raw_detail: &str) -> ConflictReport {
        let mut paths: Vec<PathBuf> = Vec::new();
        for line in raw_detail.lines() {
            let line = line.trim();
            if !line.starts_with("CONFLICT") {
                continue;
            }
            if let Some((_, path)) = line.split_once(CONFLICT_MARKER) {
                let path = PathBuf::from(path.trim());
                if !path.as_os_str().is_empty() && !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        let summary = match paths.as_slice() {
            [] => raw_detail
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or(FALLBACK_SUMMARY)
                .to_string(),
            [only] => format!("merge conflict in {}", only.display()),
            many => format!(
                "merge conflict in {} files: {}",
                many.len(),
                many.iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        ConflictReport {
            summary,
            raw_detail: raw_detail.to_string(),
            paths,
        }
    }
}

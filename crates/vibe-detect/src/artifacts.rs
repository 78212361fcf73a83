//! Small filesystem helpers shared by the detectors.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use vibe_core::VibeError;

pub(crate) fn check_cancel(cancel: &CancellationToken) -> Result<(), VibeError> {
    if cancel.is_cancelled() {
        Err(VibeError::Cancelled)
    } else {
        Ok(())
    }
}

pub(crate) fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Running maximum of artifact modification times.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NewestArtifact(Option<DateTime<Utc>>);

impl NewestArtifact {
    pub(crate) fn observe(&mut self, path: &Path) {
        if let Some(ts) = modified_at(path) {
            self.0 = Some(self.0.map_or(ts, |cur| cur.max(ts)));
        }
    }

    pub(crate) fn get(self) -> Option<DateTime<Utc>> {
        self.0
    }
}

/// Names of the regular files directly inside `dir`, sorted.
/// A missing or unreadable directory yields an empty list.
pub(crate) fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Match a file name against glob patterns.
pub(crate) fn matches_any(name: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| match glob::Pattern::new(pattern) {
        Ok(pat) => pat.matches(name),
        Err(e) => {
            tracing::warn!(pattern = %pattern, "invalid glob pattern: {e}");
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_case_sensitive() {
        assert!(matches_any("project-epics.md", &["*epic*.md"]));
        assert!(matches_any("Epic-1.md", &["*epic*.md", "*Epic*.md"]));
        assert!(!matches_any("EPIC.md", &["*epic*.md", "*Epic*.md"]));
        assert!(!matches_any("epic.txt", &["*epic*.md"]));
    }

    #[test]
    fn newest_tracks_maximum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.md");
        std::fs::write(&a, "a").expect("write");
        let mut newest = NewestArtifact::default();
        assert!(newest.get().is_none());
        newest.observe(&dir.path().join("missing.md"));
        assert!(newest.get().is_none());
        newest.observe(&a);
        assert_eq!(newest.get(), modified_at(&a));
    }

    #[test]
    fn file_names_skips_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.md"), "").expect("write");
        std::fs::write(dir.path().join("a.md"), "").expect("write");
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        assert_eq!(file_names(dir.path()), vec!["a.md", "b.md"]);
        assert!(file_names(&dir.path().join("nope")).is_empty());
    }
}

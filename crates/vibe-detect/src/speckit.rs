//! Speckit detector.
//!
//! Speckit keeps one directory per feature under a marker directory. The
//! most recently modified feature directory decides the stage.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use vibe_core::{Confidence, DetectionResult, Method, Stage, VibeError};

use crate::MethodDetector;
use crate::artifacts::{NewestArtifact, check_cancel, modified_at};

/// Marker directories, first existing wins.
pub const MARKER_DIRS: [&str; 3] = ["specs", ".speckit", ".specify/specs"];

#[derive(Debug, Default, Clone, Copy)]
pub struct SpeckitDetector;

impl SpeckitDetector {
    pub fn new() -> Self {
        Self
    }

    fn marker(path: &Path) -> Option<PathBuf> {
        MARKER_DIRS
            .iter()
            .map(|rel| path.join(rel))
            .find(|p| p.is_dir())
    }
}

impl MethodDetector for SpeckitDetector {
    fn name(&self) -> Method {
        Method::Speckit
    }

    fn can_detect(&self, path: &Path) -> bool {
        Self::marker(path).is_some()
    }

    fn detect(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<DetectionResult>, VibeError> {
        check_cancel(cancel)?;
        let Some(marker) = Self::marker(path) else {
            return Ok(None);
        };

        check_cancel(cancel)?;
        let Some(feature) = newest_feature_dir(&marker) else {
            return Ok(Some(DetectionResult::new(
                Method::Speckit,
                Stage::Unknown,
                Confidence::Uncertain,
                "Speckit: Speckit marker found but no feature directories",
            )));
        };

        let mut newest = NewestArtifact::default();
        let (stage, confidence, reasoning) = classify_feature(&feature, cancel, &mut newest)?;

        tracing::debug!(
            path = %path.display(),
            feature = %feature.display(),
            stage = %stage,
            "speckit: detection complete"
        );

        Ok(Some(
            DetectionResult::new(
                Method::Speckit,
                stage,
                confidence,
                format!("Speckit: {reasoning}"),
            )
            .with_artifact_timestamp(newest.get()),
        ))
    }
}

/// Most recently modified subdirectory; ties broken by name.
fn newest_feature_dir(marker: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(marker).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| {
            let path = e.path();
            let mtime: Option<DateTime<Utc>> = modified_at(&path);
            (mtime, path)
        })
        .max()
        .map(|(_, path)| path)
}

fn classify_feature(
    feature: &Path,
    cancel: &CancellationToken,
    newest: &mut NewestArtifact,
) -> Result<(Stage, Confidence, String), VibeError> {
    check_cancel(cancel)?;
    let tasks = feature.join("tasks.md");
    if let Ok(text) = fs::read_to_string(&tasks) {
        newest.observe(&tasks);
        let (done, total) = count_checkboxes(&text);
        let verdict = if total > 0 && done == total {
            (Stage::Implement, "All tasks complete".to_string())
        } else if done > 0 {
            (
                Stage::Implement,
                format!("Implementation in progress ({done}/{total} tasks)"),
            )
        } else {
            (Stage::Tasks, "tasks.md exists".to_string())
        };
        return Ok((verdict.0, Confidence::Certain, verdict.1));
    }

    for (file, stage) in [("plan.md", Stage::Plan), ("spec.md", Stage::Specify)] {
        check_cancel(cancel)?;
        let candidate = feature.join(file);
        if candidate.is_file() {
            newest.observe(&candidate);
            return Ok((stage, Confidence::Certain, format!("{file} exists")));
        }
    }

    let name = feature
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((
        Stage::Unknown,
        Confidence::Uncertain,
        format!("No spec artifacts in {name}"),
    ))
}

/// `(checked, total)` markdown task checkboxes.
fn count_checkboxes(text: &str) -> (usize, usize) {
    let mut done = 0;
    let mut total = 0;
    for line in text.lines() {
        let line = line.trim_start();
        let Some(rest) = line.strip_prefix("- [").or_else(|| line.strip_prefix("* [")) else {
            continue;
        };
        if rest.starts_with("x]") || rest.starts_with("X]") {
            done += 1;
            total += 1;
        } else if rest.starts_with(" ]") {
            total += 1;
        }
    }
    (done, total)
}

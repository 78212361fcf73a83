//! BMAD (v6) detector.
//!
//! Marker is a `.bmad/` directory at the project root. The v4 marker
//! `.bmad-core/` is ignored.

use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use vibe_core::{Confidence, DetectionResult, Method, Stage, VibeError};

use crate::MethodDetector;
use crate::artifacts::{NewestArtifact, check_cancel, file_names, matches_any};
use crate::sprint_status::{self, StageVerdict};

pub const MARKER_DIR: &str = ".bmad";
const CONFIG_FILE: &str = ".bmad/bmm/config.yaml";
const SPRINT_STATUS_FILES: [&str; 2] = [
    "docs/sprint-artifacts/sprint-status.yaml",
    "docs/sprint-status.yaml",
];
const DOCS_DIR: &str = "docs";

/// Artifact scan rules, tried in order when no sprint status is usable.
const ARTIFACT_RULES: [(&[&str], Stage, &str); 3] = [
    (
        &["*epic*.md", "*Epic*.md"],
        Stage::Implement,
        "Epics defined but no sprint status",
    ),
    (
        &["*architecture*.md"],
        Stage::Plan,
        "Architecture defined, no epics yet",
    ),
    (
        &["*prd*.md", "*PRD*.md"],
        Stage::Specify,
        "PRD defined, no architecture yet",
    ),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct BmadDetector;

impl BmadDetector {
    pub fn new() -> Self {
        Self
    }
}

impl MethodDetector for BmadDetector {
    fn name(&self) -> Method {
        Method::Bmad
    }

    fn can_detect(&self, path: &Path) -> bool {
        path.join(MARKER_DIR).is_dir()
    }

    fn detect(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<DetectionResult>, VibeError> {
        check_cancel(cancel)?;
        if !self.can_detect(path) {
            return Ok(None);
        }

        let mut newest = NewestArtifact::default();

        check_cancel(cancel)?;
        let config_path = path.join(CONFIG_FILE);
        let config = fs::read_to_string(&config_path).ok();
        if config.is_some() {
            newest.observe(&config_path);
        }
        let version = config.as_deref().and_then(parse_version);

        let verdict = match config {
            None => StageVerdict {
                stage: Stage::Unknown,
                confidence: Confidence::Likely,
                reasoning: ".bmad folder exists but config.yaml not found".to_string(),
            },
            Some(_) => {
                let resolved = resolve_stage(path, cancel, &mut newest)?;
                let confidence = if resolved.confidence == Confidence::Uncertain {
                    Confidence::Likely
                } else {
                    Confidence::Certain
                };
                StageVerdict {
                    confidence,
                    ..resolved
                }
            }
        };

        let prefix = match version {
            Some(v) => format!("BMAD v{v}, "),
            None => "BMAD detected, ".to_string(),
        };

        tracing::debug!(
            path = %path.display(),
            stage = %verdict.stage,
            "bmad: detection complete"
        );

        Ok(Some(
            DetectionResult::new(
                Method::Bmad,
                verdict.stage,
                verdict.confidence,
                format!("{prefix}{}", verdict.reasoning),
            )
            .with_artifact_timestamp(newest.get()),
        ))
    }
}

/// Version token from the first `# Version: <token>` line.
fn parse_version(config: &str) -> Option<String> {
    config.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("# Version:")?;
        rest.split_whitespace().next().map(str::to_string)
    })
}

fn resolve_stage(
    path: &Path,
    cancel: &CancellationToken,
    newest: &mut NewestArtifact,
) -> Result<StageVerdict, VibeError> {
    for rel in SPRINT_STATUS_FILES {
        check_cancel(cancel)?;
        let status_path = path.join(rel);
        let Ok(text) = fs::read_to_string(&status_path) else {
            continue;
        };
        match sprint_status::parse(&text) {
            Ok(status) => {
                newest.observe(&status_path);
                return Ok(sprint_status::stage_from(&status));
            }
            Err(e) => {
                tracing::debug!(
                    path = %status_path.display(),
                    "bmad: unparseable sprint status, falling back: {e}"
                );
            }
        }
    }

    check_cancel(cancel)?;
    let docs = path.join(DOCS_DIR);
    let names = file_names(&docs);
    for (patterns, stage, reasoning) in ARTIFACT_RULES {
        check_cancel(cancel)?;
        let matched: Vec<&String> = names
            .iter()
            .filter(|name| matches_any(name, patterns))
            .collect();
        if matched.is_empty() {
            continue;
        }
        for name in matched {
            newest.observe(&docs.join(name));
        }
        return Ok(StageVerdict {
            stage,
            confidence: Confidence::Likely,
            reasoning: reasoning.to_string(),
        });
    }

    Ok(StageVerdict {
        stage: Stage::Unknown,
        confidence: Confidence::Uncertain,
        reasoning: "No BMAD artifacts detected".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, contents).expect("write");
        path
    }

    fn detect(root: &Path) -> Option<DetectionResult> {
        BmadDetector::new()
            .detect(root, &CancellationToken::new())
            .expect("detect")
    }

    #[test]
    fn version_line_is_extracted() {
        assert_eq!(
            parse_version("# BMM config\n# Version: 6.0.0-alpha.13\nfoo: bar\n").as_deref(),
            Some("6.0.0-alpha.13")
        );
        assert_eq!(parse_version("project: x\n"), None);
        assert_eq!(parse_version("# Version:   \n"), None);
    }

    #[test]
    fn no_marker_is_not_bmad() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(".bmad-core")).expect("mkdir");
        assert!(!BmadDetector::new().can_detect(dir.path()));
        assert!(detect(dir.path()).is_none());
    }

    #[test]
    fn sprint_status_drives_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), CONFIG_FILE, "# Version: 6.0.0-alpha.13\n");
        write(
            dir.path(),
            "docs/sprint-artifacts/sprint-status.yaml",
            "development_status:\n  epic-1: in-progress\n  1-1-feature: in-progress\n  1-2-feature: backlog\n",
        );
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.method, Method::Bmad);
        assert_eq!(result.stage, Stage::Implement);
        assert_eq!(result.confidence, Confidence::Certain);
        assert_eq!(
            result.reasoning,
            "BMAD v6.0.0-alpha.13, Story 1.1 being implemented"
        );
        assert!(result.artifact_timestamp.is_some());
    }

    #[test]
    fn legacy_sprint_status_location_is_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), CONFIG_FILE, "# Version: 6.0.0\n");
        write(
            dir.path(),
            "docs/sprint-status.yaml",
            "development_status:\n  epic-1: backlog\n",
        );
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.stage, Stage::Specify);
    }

    #[test]
    fn broken_sprint_status_falls_back_to_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), CONFIG_FILE, "name: x\n");
        write(
            dir.path(),
            "docs/sprint-artifacts/sprint-status.yaml",
            "development_status: [",
        );
        write(dir.path(), "docs/architecture.md", "# Arch\n");
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.stage, Stage::Plan);
        assert_eq!(result.confidence, Confidence::Certain);
        assert!(result.reasoning.starts_with("BMAD detected, "));
    }

    #[test]
    fn artifact_scan_precedence() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), CONFIG_FILE, "# Version: 6\n");
        write(dir.path(), "docs/prd.md", "");
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.stage, Stage::Specify);

        write(dir.path(), "docs/Epic-list.md", "");
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.stage, Stage::Implement);
        assert_eq!(result.reasoning, "BMAD v6, Epics defined but no sprint status");
    }

    #[test]
    fn no_artifacts_downgrades_to_likely() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), CONFIG_FILE, "# Version: 6\n");
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.stage, Stage::Unknown);
        assert_eq!(result.confidence, Confidence::Likely);
        assert_eq!(result.reasoning, "BMAD v6, No BMAD artifacts detected");
    }

    #[test]
    fn missing_config_is_likely_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(MARKER_DIR)).expect("mkdir");
        write(dir.path(), "docs/prd.md", "");
        let result = detect(dir.path()).expect("bmad detected");
        assert_eq!(result.stage, Stage::Unknown);
        assert_eq!(result.confidence, Confidence::Likely);
        assert_eq!(
            result.reasoning,
            "BMAD detected, .bmad folder exists but config.yaml not found"
        );
        assert!(result.artifact_timestamp.is_none());
    }

    #[test]
    fn cancelled_detection_returns_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), CONFIG_FILE, "# Version: 6\n");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = BmadDetector::new()
            .detect(dir.path(), &cancel)
            .expect_err("cancelled");
        assert!(matches!(err, VibeError::Cancelled));
    }
}

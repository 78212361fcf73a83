//! BMAD `sprint-status.yaml` interpretation.
//!
//! The file carries a flat `development_status` map of epic, story, and
//! retrospective keys to status strings. Stage is derived from the first
//! active epic and the state of its stories.

use std::collections::BTreeMap;

use serde::Deserialize;
use vibe_core::{Confidence, Stage};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SprintStatus {
    #[serde(default)]
    pub development_status: BTreeMap<String, serde_yaml::Value>,
}

/// Parse the YAML text of a sprint-status file.
pub fn parse(text: &str) -> Result<SprintStatus, serde_yaml::Error> {
    // An empty document deserializes as unit; treat it as an empty map.
    if text.trim().is_empty() {
        return Ok(SprintStatus::default());
    }
    serde_yaml::from_str(text)
}

/// Stage, confidence, and reasoning derived from a sprint-status file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageVerdict {
    pub stage: Stage,
    pub confidence: Confidence,
    pub reasoning: String,
}

impl StageVerdict {
    fn new(stage: Stage, confidence: Confidence, reasoning: impl Into<String>) -> Self {
        Self {
            stage,
            confidence,
            reasoning: reasoning.into(),
        }
    }
}

// ─── Key grammar ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Key {
    /// `epic-N` or `epic-N-M`; holds the numeric segments.
    Epic(Vec<String>),
    /// `N-M[-K]-slug`; holds every leading numeric segment.
    Story(Vec<String>),
    Other,
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn classify_key(key: &str) -> Key {
    if key.ends_with("-retrospective") {
        return Key::Other;
    }
    if let Some(rest) = key.strip_prefix("epic-") {
        let parts: Vec<&str> = rest.split('-').collect();
        if (1..=2).contains(&parts.len()) && parts.iter().all(|p| is_numeric(p)) {
            return Key::Epic(parts.into_iter().map(str::to_string).collect());
        }
        return Key::Other;
    }

    let parts: Vec<&str> = key.split('-').collect();
    let numeric = parts.iter().take_while(|p| is_numeric(p)).count();
    // A story needs an epic prefix plus its own number, then a slug.
    if numeric >= 2 && numeric < parts.len() {
        return Key::Story(parts[..numeric].iter().map(|s| s.to_string()).collect());
    }
    Key::Other
}

fn status_of(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.trim().to_ascii_lowercase(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default(),
    }
}

// ─── Stage rules ──────────────────────────────────────────────────

struct Epic {
    numbers: Vec<String>,
    status: String,
}

struct Story {
    epic: Vec<String>,
    numbers: Vec<String>,
    status: String,
}

/// Apply the sprint-status stage rules. Keys are scanned in lexicographic
/// order, which `BTreeMap` already guarantees.
pub fn stage_from(status: &SprintStatus) -> StageVerdict {
    let entries = &status.development_status;
    if entries.is_empty() {
        return StageVerdict::new(Stage::Unknown, Confidence::Uncertain, "Sprint status is empty");
    }

    let mut epics = Vec::new();
    let mut stories = Vec::new();
    for (key, value) in entries {
        match classify_key(key) {
            Key::Epic(numbers) => epics.push(Epic {
                numbers,
                status: status_of(value),
            }),
            Key::Story(numbers) => stories.push(Story {
                epic: numbers[..numbers.len() - 1].to_vec(),
                numbers,
                status: status_of(value),
            }),
            Key::Other => {}
        }
    }

    if !epics.is_empty() {
        if epics.iter().all(|e| e.status == "done") {
            return StageVerdict::new(
                Stage::Implement,
                Confidence::Certain,
                "All epics complete - project done",
            );
        }
        if epics.iter().all(|e| e.status == "backlog") {
            return StageVerdict::new(
                Stage::Specify,
                Confidence::Certain,
                "No epics in progress - planning phase",
            );
        }
    }

    let active = epics
        .iter()
        .find(|e| e.status == "in-progress" || e.status == "contexted");
    if let Some(epic) = active {
        let own: Vec<&Story> = stories.iter().filter(|s| s.epic == epic.numbers).collect();
        if let Some(story) = own.iter().find(|s| s.status == "review") {
            return StageVerdict::new(
                Stage::Tasks,
                Confidence::Certain,
                format!("Story {} in code review", story.numbers.join(".")),
            );
        }
        if let Some(story) = own.iter().find(|s| s.status == "in-progress") {
            return StageVerdict::new(
                Stage::Implement,
                Confidence::Certain,
                format!("Story {} being implemented", story.numbers.join(".")),
            );
        }
        return StageVerdict::new(
            Stage::Plan,
            Confidence::Certain,
            format!("Epic {} started, preparing stories", epic.numbers.join(".")),
        );
    }

    StageVerdict::new(
        Stage::Unknown,
        Confidence::Uncertain,
        "Unable to determine stage from sprint status",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(yaml: &str) -> StageVerdict {
        stage_from(&parse(yaml).expect("valid yaml"))
    }

    #[test]
    fn key_grammar() {
        assert_eq!(classify_key("epic-1"), Key::Epic(vec!["1".into()]));
        assert_eq!(
            classify_key("epic-1-2"),
            Key::Epic(vec!["1".into(), "2".into()])
        );
        assert_eq!(classify_key("epic-x"), Key::Other);
        assert_eq!(classify_key("epic-1-retrospective"), Key::Other);
        assert_eq!(
            classify_key("1-2-login-form"),
            Key::Story(vec!["1".into(), "2".into()])
        );
        assert_eq!(
            classify_key("1-2-3-nested"),
            Key::Story(vec!["1".into(), "2".into(), "3".into()])
        );
        assert_eq!(classify_key("1-2"), Key::Other);
        assert_eq!(classify_key("1-feature"), Key::Other);
    }

    #[test]
    fn story_in_progress_means_implement() {
        let v = verdict(
            "development_status:\n  epic-1: in-progress\n  1-1-feature: in-progress\n  1-2-feature: backlog\n",
        );
        assert_eq!(v.stage, Stage::Implement);
        assert_eq!(v.confidence, Confidence::Certain);
        assert_eq!(v.reasoning, "Story 1.1 being implemented");
    }

    #[test]
    fn review_beats_in_progress() {
        let v = verdict(
            "development_status:\n  epic-2: contexted\n  2-1-a: in-progress\n  2-2-b: review\n",
        );
        assert_eq!(v.stage, Stage::Tasks);
        assert_eq!(v.reasoning, "Story 2.2 in code review");
    }

    #[test]
    fn active_epic_without_active_stories_is_plan() {
        let v = verdict(
            "development_status:\n  epic-1: done\n  epic-2: in-progress\n  1-1-a: done\n  2-1-b: backlog\n",
        );
        assert_eq!(v.stage, Stage::Plan);
        assert_eq!(v.reasoning, "Epic 2 started, preparing stories");
    }

    #[test]
    fn nested_epic_numbers_use_dots() {
        let v = verdict("development_status:\n  epic-3-1: in-progress\n  3-1-4-x: review\n");
        assert_eq!(v.reasoning, "Story 3.1.4 in code review");
        let v = verdict("development_status:\n  epic-3-1: in-progress\n");
        assert_eq!(v.reasoning, "Epic 3.1 started, preparing stories");
    }

    #[test]
    fn all_done_and_all_backlog() {
        let v = verdict(
            "development_status:\n  epic-1: done\n  epic-2: done\n  epic-1-retrospective: optional\n",
        );
        assert_eq!(v.stage, Stage::Implement);
        assert_eq!(v.reasoning, "All epics complete - project done");

        let v = verdict("development_status:\n  epic-1: backlog\n  epic-2: backlog\n");
        assert_eq!(v.stage, Stage::Specify);
        assert_eq!(v.confidence, Confidence::Certain);
    }

    #[test]
    fn empty_and_unrecognised_shapes_are_unknown() {
        let v = verdict("development_status: {}\n");
        assert_eq!((v.stage, v.confidence), (Stage::Unknown, Confidence::Uncertain));

        let v = verdict("");
        assert_eq!(v.stage, Stage::Unknown);

        let v = verdict("development_status:\n  epic-1: done\n  epic-2: backlog\n");
        assert_eq!(v.stage, Stage::Unknown);
        assert_eq!(v.reasoning, "Unable to determine stage from sprint status");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(parse("development_status: [unterminated").is_err());
    }
}

//! Human-readable and JSON rendering.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vibe_core::ProjectState;
use vibe_engine::ProjectSnapshot;

pub const API_VERSION: &str = "v1";

#[derive(Serialize)]
struct ListOutput<'a> {
    api_version: &'static str,
    projects: &'a [ProjectSnapshot],
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    api_version: &'static str,
    project: &'a ProjectSnapshot,
}

pub fn list_json(projects: &[ProjectSnapshot]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&ListOutput {
        api_version: API_VERSION,
        projects,
    })?)
}

pub fn status_json(project: &ProjectSnapshot) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&StatusOutput {
        api_version: API_VERSION,
        project,
    })?)
}

/// Compact age: "just now", "5m", "3h", "2d", "6w".
pub fn relative_time(seconds: i64) -> String {
    let s = seconds.unsigned_abs();
    if s < 60 {
        "just now".to_string()
    } else if s < 3600 {
        format!("{}m", s / 60)
    } else if s < 86400 {
        format!("{}h", s / 3600)
    } else if s < 86400 * 30 {
        format!("{}d", s / 86400)
    } else {
        format!("{}w", s / (86400 * 7))
    }
}

fn state_column(p: &ProjectSnapshot) -> String {
    match p.project.state {
        ProjectState::Hibernated => "hibernated".to_string(),
        ProjectState::Active => p.agent_status.to_string(),
    }
}

/// One row per project, favorites marked with `*`.
pub fn list_table(projects: &[ProjectSnapshot], now: DateTime<Utc>) -> String {
    if projects.is_empty() {
        return "No projects tracked. Add one with `vibe add <path>`.".to_string();
    }

    let rows: Vec<[String; 5]> = projects
        .iter()
        .map(|p| {
            let fav = if p.project.is_favorite { "*" } else { " " };
            let method = if p.project.is_coexisting() {
                "multiple".to_string()
            } else {
                p.project.detected_method.to_string()
            };
            [
                format!("{fav} {}", p.label()),
                p.project.current_stage.to_string(),
                method,
                state_column(p),
                relative_time((now - p.project.last_activity_at).num_seconds()),
            ]
        })
        .collect();

    let header = ["  NAME", "STAGE", "METHOD", "STATUS", "ACTIVE"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let render = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(&header)];
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(render(&cells));
    }
    lines.join("\n")
}

pub fn status_text(p: &ProjectSnapshot, now: DateTime<Utc>) -> String {
    let project = &p.project;
    let mut lines = vec![
        format!("{} ({})", p.label(), project.id),
        format!("  path:        {}", project.canonical_path.display()),
        format!("  method:      {}", project.detected_method),
        format!(
            "  stage:       {} ({})",
            project.current_stage, project.confidence
        ),
        format!("  reasoning:   {}", project.detection_reasoning),
        format!("  state:       {}", project.state),
        format!("  agent:       {}", p.agent_status),
        format!(
            "  activity:    {} ({})",
            relative_time((now - project.last_activity_at).num_seconds()),
            project.last_activity_at.to_rfc3339()
        ),
        format!("  favorite:    {}", if project.is_favorite { "yes" } else { "no" }),
        format!(
            "  hibernation: {}",
            match p.effective_hibernation_days {
                0 => "disabled".to_string(),
                d => format!("after {d} days"),
            }
        ),
    ];
    if project.is_coexisting() {
        let methods: Vec<String> = project
            .coexisting_methods
            .iter()
            .map(ToString::to_string)
            .collect();
        lines.push(format!("  coexisting:  {}", methods.join(", ")));
    }
    if let Some(at) = project.hibernated_at {
        lines.push(format!("  hibernated:  {}", at.to_rfc3339()));
    }
    if !project.notes.is_empty() {
        lines.push(format!("  notes:       {}", project.notes));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vibe_core::{AgentStatus, Project};

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn snapshot(name: &str) -> ProjectSnapshot {
        ProjectSnapshot {
            project: Project::new(PathBuf::from(format!("/w/{name}")), ts("2026-03-01T10:00:00Z")),
            dir_name: name.to_string(),
            agent_status: AgentStatus::Working,
            effective_hibernation_days: 14,
            effective_waiting_threshold_minutes: 10,
        }
    }

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(5), "just now");
        assert_eq!(relative_time(300), "5m");
        assert_eq!(relative_time(7200), "2h");
        assert_eq!(relative_time(86400 * 3), "3d");
        assert_eq!(relative_time(86400 * 42), "6w");
    }

    #[test]
    fn json_envelope_carries_api_version() {
        let json = list_json(&[snapshot("api")]).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["api_version"], "v1");
        assert_eq!(value["projects"][0]["name"], "api");
        assert_eq!(value["projects"][0]["agent_status"], "working");
        assert_eq!(value["projects"][0]["effective_hibernation_days"], 14);

        let json = status_json(&snapshot("web")).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["project"]["state"], "active");
    }

    #[test]
    fn table_marks_favorites_and_aligns_columns() {
        let mut fav = snapshot("api");
        fav.project.is_favorite = true;
        let table = list_table(&[fav, snapshot("frontend")], ts("2026-03-01T12:00:00Z"));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  NAME"));
        assert!(lines[1].starts_with("* api"));
        assert!(lines[2].starts_with("  frontend"));
        assert!(lines[1].contains("2h"));
        let stage_col = lines[0].find("STAGE").expect("header");
        assert_eq!(&lines[1][stage_col..stage_col + 7], "unknown");
    }

    #[test]
    fn empty_list_has_a_hint() {
        assert!(list_table(&[], Utc::now()).contains("vibe add"));
    }
}

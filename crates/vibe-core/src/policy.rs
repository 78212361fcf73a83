//! Inactivity policies: auto-hibernation and agent waiting status.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::{AgentStatus, Project, ProjectState};

/// Global default for auto-hibernation, in days.
pub const DEFAULT_HIBERNATION_DAYS: u32 = 14;

/// Global default for the waiting threshold, in minutes.
pub const DEFAULT_WAITING_THRESHOLD_MINUTES: u32 = 10;

/// Per-project override wins over the global value. `0` means disabled.
pub fn effective(project_override: Option<u32>, global: u32) -> u32 {
    project_override.unwrap_or(global)
}

/// Whether the sweep should hibernate `project` at `now`.
///
/// Only Active, non-favorite projects qualify, and `hibernation_days == 0`
/// disables the check.
pub fn should_hibernate(project: &Project, now: DateTime<Utc>, hibernation_days: u32) -> bool {
    if hibernation_days == 0
        || project.is_favorite
        || project.state != ProjectState::Active
    {
        return false;
    }
    now - project.last_activity_at >= TimeDelta::days(i64::from(hibernation_days))
}

/// Derived agent status.
///
/// Hibernated projects are `Inactive`. A disabled threshold (`0`) never
/// classifies as waiting and yields `Unknown`.
pub fn agent_status(project: &Project, now: DateTime<Utc>, threshold_minutes: u32) -> AgentStatus {
    if project.state == ProjectState::Hibernated {
        return AgentStatus::Inactive;
    }
    if threshold_minutes == 0 {
        return AgentStatus::Unknown;
    }
    if now - project.last_activity_at >= TimeDelta::minutes(i64::from(threshold_minutes)) {
        AgentStatus::Waiting
    } else {
        AgentStatus::Working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn project_idle_since(at: &str) -> Project {
        Project::new(PathBuf::from("/tmp/api"), ts(at))
    }

    #[test]
    fn override_takes_precedence() {
        assert_eq!(effective(Some(3), 14), 3);
        assert_eq!(effective(Some(0), 14), 0);
        assert_eq!(effective(None, 14), 14);
    }

    #[test]
    fn hibernates_at_exact_boundary() {
        let p = project_idle_since("2026-03-01T00:00:00Z");
        assert!(!should_hibernate(&p, ts("2026-03-14T23:59:59Z"), 14));
        assert!(should_hibernate(&p, ts("2026-03-15T00:00:00Z"), 14));
    }

    #[test]
    fn zero_days_disables_hibernation() {
        let p = project_idle_since("2020-01-01T00:00:00Z");
        assert!(!should_hibernate(&p, ts("2026-03-01T00:00:00Z"), 0));
    }

    #[test]
    fn favorites_and_hibernated_are_skipped() {
        let mut p = project_idle_since("2020-01-01T00:00:00Z");
        p.is_favorite = true;
        assert!(!should_hibernate(&p, ts("2026-03-01T00:00:00Z"), 1));

        let mut p = project_idle_since("2020-01-01T00:00:00Z");
        p.state = ProjectState::Hibernated;
        assert!(!should_hibernate(&p, ts("2026-03-01T00:00:00Z"), 1));
    }

    #[test]
    fn agent_status_thresholds() {
        let p = project_idle_since("2026-03-01T10:00:00Z");
        assert_eq!(agent_status(&p, ts("2026-03-01T10:09:59Z"), 10), AgentStatus::Working);
        assert_eq!(agent_status(&p, ts("2026-03-01T10:10:00Z"), 10), AgentStatus::Waiting);
        assert_eq!(agent_status(&p, ts("2026-03-01T12:00:00Z"), 0), AgentStatus::Unknown);

        let mut hibernated = p.clone();
        hibernated.state = ProjectState::Hibernated;
        assert_eq!(
            agent_status(&hibernated, ts("2026-03-01T10:00:01Z"), 10),
            AgentStatus::Inactive
        );
    }
}

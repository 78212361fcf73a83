//! Active ↔ Hibernated lifecycle state machine.
//!
//! [`next_state`] is the strict machine: self-transitions are rejected with
//! `InvalidStateTransition`. [`apply_trigger`] is what callers use; it treats
//! self-transitions as idempotent no-ops and keeps `hibernated_at` in sync.

use chrono::{DateTime, Utc};

use crate::error::VibeError;
use crate::types::{Project, ProjectState};

/// What caused a lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit user request to hibernate.
    Hibernate,
    /// Explicit user request to activate.
    Activate,
    /// Periodic inactivity sweep.
    Sweep,
    /// A file event under the project's path.
    FileActivity,
}

impl Trigger {
    fn target(self) -> ProjectState {
        match self {
            Self::Hibernate | Self::Sweep => ProjectState::Hibernated,
            Self::Activate | Self::FileActivity => ProjectState::Active,
        }
    }
}

/// Strict transition function.
///
/// Favorites can never move to `Hibernated`; any trigger that would leave
/// the state unchanged is an `InvalidStateTransition`.
pub fn next_state(
    current: ProjectState,
    trigger: Trigger,
    is_favorite: bool,
    label: &str,
) -> Result<ProjectState, VibeError> {
    let target = trigger.target();
    if target == ProjectState::Hibernated && is_favorite {
        return Err(VibeError::FavoriteCannotHibernate(label.to_string()));
    }
    if current == target {
        return Err(VibeError::InvalidStateTransition {
            from: current,
            to: target,
        });
    }
    Ok(target)
}

/// Apply `trigger` to `project`. Returns `Ok(true)` when the state changed,
/// `Ok(false)` for an idempotent self-transition.
pub fn apply_trigger(
    project: &mut Project,
    trigger: Trigger,
    now: DateTime<Utc>,
) -> Result<bool, VibeError> {
    match next_state(project.state, trigger, project.is_favorite, project.label()) {
        Ok(state) => {
            project.state = state;
            project.hibernated_at = match state {
                ProjectState::Hibernated => Some(now),
                ProjectState::Active => None,
            };
            project.updated_at = now;
            Ok(true)
        }
        Err(VibeError::InvalidStateTransition { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

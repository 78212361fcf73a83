//! Immutable project views handed out by the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vibe_core::policy::{agent_status, effective};
use vibe_core::{AgentStatus, Project};
use vibe_store::{ProjectConfig, Settings};

/// In-memory record the engine owns for each tracked project.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub dir_name: String,
    pub project: Project,
    pub config: ProjectConfig,
}

impl Entry {
    pub fn hibernation_days(&self, settings: &Settings) -> u32 {
        effective(self.config.custom_hibernation_days, settings.hibernation_days)
    }

    pub fn waiting_threshold(&self, settings: &Settings) -> u32 {
        effective(
            self.config.agent_waiting_threshold_minutes,
            settings.agent_waiting_threshold_minutes,
        )
    }

    pub fn snapshot(&self, settings: &Settings, now: DateTime<Utc>) -> ProjectSnapshot {
        let threshold = self.waiting_threshold(settings);
        ProjectSnapshot {
            project: self.project.clone(),
            dir_name: self.dir_name.clone(),
            agent_status: agent_status(&self.project, now, threshold),
            effective_hibernation_days: self.hibernation_days(settings),
            effective_waiting_threshold_minutes: threshold,
        }
    }
}

/// A project plus the values derived from its config and the clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSnapshot {
    #[serde(flatten)]
    pub project: Project,
    pub dir_name: String,
    pub agent_status: AgentStatus,
    pub effective_hibernation_days: u32,
    pub effective_waiting_threshold_minutes: u32,
}

impl ProjectSnapshot {
    pub fn id(&self) -> &str {
        &self.project.id
    }

    pub fn label(&self) -> &str {
        self.project.label()
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::VibeError;
use crate::identity::{project_id, project_name};

// ─── Method ───────────────────────────────────────────────────────

/// Workflow methodology a project follows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Speckit,
    Bmad,
    #[default]
    Unknown,
}

impl Method {
    pub const ALL: [Self; 3] = [Self::Speckit, Self::Bmad, Self::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speckit => "speckit",
            Self::Bmad => "bmad",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "speckit" => Ok(Self::Speckit),
            "bmad" => Ok(Self::Bmad),
            "unknown" | "" => Ok(Self::Unknown),
            _ => Err(VibeError::InvalidMethod(s.to_string())),
        }
    }
}

// ─── Stage ────────────────────────────────────────────────────────

/// Coarse workflow phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Unknown,
    Specify,
    Plan,
    Tasks,
    Implement,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::Unknown,
        Self::Specify,
        Self::Plan,
        Self::Tasks,
        Self::Implement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Specify => "specify",
            Self::Plan => "plan",
            Self::Tasks => "tasks",
            Self::Implement => "implement",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" | "" => Ok(Self::Unknown),
            "specify" => Ok(Self::Specify),
            "plan" => Ok(Self::Plan),
            "tasks" => Ok(Self::Tasks),
            "implement" => Ok(Self::Implement),
            _ => Err(VibeError::InvalidStage(s.to_string())),
        }
    }
}

// ─── Confidence ───────────────────────────────────────────────────

/// How sure a detector is about its classification.
/// Ordered so that `Certain > Likely > Uncertain`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Uncertain,
    Likely,
    Certain,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uncertain => "uncertain",
            Self::Likely => "likely",
            Self::Certain => "certain",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uncertain" | "" => Ok(Self::Uncertain),
            "likely" => Ok(Self::Likely),
            "certain" => Ok(Self::Certain),
            _ => Err(VibeError::InvalidConfidence(s.to_string())),
        }
    }
}

// ─── Lifecycle state ──────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    #[default]
    Active,
    Hibernated,
}

impl ProjectState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Hibernated => "hibernated",
        }
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectState {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "hibernated" => Ok(Self::Hibernated),
            _ => Err(VibeError::InvalidProjectState(s.to_string())),
        }
    }
}

// ─── Agent status ─────────────────────────────────────────────────

/// Derived attention signal: is the project waiting on the user?
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Unknown,
    Working,
    Waiting,
    Inactive,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Working => "working",
            Self::Waiting => "waiting",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "working" => Ok(Self::Working),
            "waiting" => Ok(Self::Waiting),
            "inactive" => Ok(Self::Inactive),
            _ => Err(VibeError::InvalidAgentStatus(s.to_string())),
        }
    }
}

// ─── Detection ────────────────────────────────────────────────────

/// Output of a single methodology detector for one project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub method: Method,
    pub stage: Stage,
    pub confidence: Confidence,
    pub reasoning: String,
    /// Newest modification time among the artifacts the detector consulted.
    /// `None` when no artifact carried a usable timestamp.
    pub artifact_timestamp: Option<DateTime<Utc>>,
}

impl DetectionResult {
    pub fn new(
        method: Method,
        stage: Stage,
        confidence: Confidence,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            method,
            stage,
            confidence,
            reasoning: reasoning.into(),
            artifact_timestamp: None,
        }
    }

    pub fn with_artifact_timestamp(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.artifact_timestamp = ts;
        self
    }
}

// ─── Stage transitions ────────────────────────────────────────────

/// One durable record of a project moving between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub id: String,
    pub project_id: String,
    /// `None` for the first record of a project (stored as `""`).
    pub from_stage: Option<Stage>,
    pub to_stage: Stage,
    pub transitioned_at: DateTime<Utc>,
}

impl StageTransition {
    pub fn new(
        project_id: impl Into<String>,
        from_stage: Option<Stage>,
        to_stage: Stage,
        transitioned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            from_stage,
            to_stage,
            transitioned_at,
        }
    }

    pub fn from_stage_str(&self) -> &'static str {
        self.from_stage.map(Stage::as_str).unwrap_or("")
    }
}

// ─── File events ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
}

impl FileOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse, debounced filesystem change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub path: PathBuf,
    pub operation: FileOperation,
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, operation: FileOperation, timestamp: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            operation,
            timestamp,
        }
    }
}

// ─── Project ──────────────────────────────────────────────────────

/// A tracked project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub canonical_path: PathBuf,
    pub name: String,
    pub display_name: Option<String>,
    pub detected_method: Method,
    pub current_stage: Stage,
    pub confidence: Confidence,
    pub detection_reasoning: String,
    /// Methods whose artifacts are too close in time to pick a winner.
    /// Empty unless the last detection ended in coexistence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coexisting_methods: Vec<Method>,
    pub state: ProjectState,
    pub is_favorite: bool,
    pub notes: String,
    pub last_activity_at: DateTime<Utc>,
    pub hibernated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// New Active project with an unknown classification.
    /// `canonical_path` must already be canonical.
    pub fn new(canonical_path: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            id: project_id(&canonical_path),
            name: project_name(&canonical_path),
            canonical_path,
            display_name: None,
            detected_method: Method::Unknown,
            current_stage: Stage::Unknown,
            confidence: Confidence::Uncertain,
            detection_reasoning: String::new(),
            coexisting_methods: Vec::new(),
            state: ProjectState::Active,
            is_favorite: false,
            notes: String::new(),
            last_activity_at: now,
            hibernated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display name when set and non-empty, otherwise the directory name.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    pub fn is_coexisting(&self) -> bool {
        !self.coexisting_methods.is_empty()
    }
}

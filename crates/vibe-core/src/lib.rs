//! vibe-core: domain model for the vibe-dash project state engine.
//! Project records, detection results, stage transitions, the detection
//! arbiter, and the lifecycle/hibernation policies.
//!
//! Pure and side-effect free: every function that depends on time takes
//! `now` as a parameter.

pub mod arbiter;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod naming;
pub mod policy;
pub mod types;

pub use arbiter::{Classification, classify, coexistence_threshold, select_winner};
pub use error::{ErrorKind, VibeError};
pub use identity::{project_id, project_name};
pub use lifecycle::{Trigger, apply_trigger, next_state};
pub use types::{
    AgentStatus, Confidence, DetectionResult, FileEvent, FileOperation, Method, Project,
    ProjectState, Stage, StageTransition,
};

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, VibeError>;

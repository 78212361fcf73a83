//! Error types shared by every vibe-dash crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProjectState;

#[derive(Debug, Error)]
pub enum VibeError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already tracked: {}", .0.display())]
    ProjectAlreadyExists(PathBuf),

    #[error("detection failed: {0}")]
    DetectionFailed(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("path not accessible: {path}: {reason}")]
    PathNotAccessible { path: String, reason: String },

    #[error("cannot allocate a directory for {} within {depth} attempts", path.display())]
    CollisionUnresolvable { path: PathBuf, depth: usize },

    #[error("invalid stage: {0:?}")]
    InvalidStage(String),

    #[error("invalid confidence: {0:?}")]
    InvalidConfidence(String),

    #[error("invalid agent status: {0:?}")]
    InvalidAgentStatus(String),

    #[error("invalid project state: {0:?}")]
    InvalidProjectState(String),

    #[error("invalid method: {0:?}")]
    InvalidMethod(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: ProjectState, to: ProjectState },

    #[error("favorite project cannot be hibernated: {0}")]
    FavoriteCannotHibernate(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("storage error: {context}: {detail}")]
    Storage { context: String, detail: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file watcher error: {0}")]
    Watch(String),
}

impl VibeError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn storage(context: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Storage {
            context: context.into(),
            detail: detail.to_string(),
        }
    }

    pub fn path_not_accessible(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::PathNotAccessible {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Coarse classification used by callers that only care about the
    /// category (exit codes, retry decisions).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            Self::ProjectAlreadyExists(_) => ErrorKind::ProjectAlreadyExists,
            Self::DetectionFailed(_) => ErrorKind::DetectionFailed,
            Self::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Self::PathNotAccessible { .. } => ErrorKind::PathNotAccessible,
            Self::CollisionUnresolvable { .. } => ErrorKind::CollisionUnresolvable,
            Self::InvalidStage(_)
            | Self::InvalidConfidence(_)
            | Self::InvalidAgentStatus(_)
            | Self::InvalidProjectState(_)
            | Self::InvalidMethod(_) => ErrorKind::InvalidValue,
            Self::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            Self::FavoriteCannotHibernate(_) => ErrorKind::FavoriteCannotHibernate,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ConfirmationRequired(_) => ErrorKind::ConfirmationRequired,
            Self::Storage { .. } | Self::Io { .. } | Self::Watch(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ProjectNotFound,
    ProjectAlreadyExists,
    DetectionFailed,
    ConfigInvalid,
    PathNotAccessible,
    CollisionUnresolvable,
    InvalidValue,
    InvalidStateTransition,
    FavoriteCannotHibernate,
    Cancelled,
    ConfirmationRequired,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_parse_errors_share_invalid_value_kind() {
        for err in [
            VibeError::InvalidStage("x".into()),
            VibeError::InvalidConfidence("x".into()),
            VibeError::InvalidAgentStatus("x".into()),
            VibeError::InvalidProjectState("x".into()),
            VibeError::InvalidMethod("x".into()),
        ] {
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = VibeError::path_not_accessible("~/missing", "no such file or directory");
        assert_eq!(
            err.to_string(),
            "path not accessible: ~/missing: no such file or directory"
        );

        let err = VibeError::InvalidStateTransition {
            from: ProjectState::Active,
            to: ProjectState::Active,
        };
        assert_eq!(err.to_string(), "invalid state transition: active -> active");
    }
}

//! Exit-code mapping.

use std::fmt;

use vibe_core::{ErrorKind, VibeError};

pub const GENERAL_ERROR: u8 = 1;
pub const PROJECT_NOT_FOUND: u8 = 2;
pub const CONFIG_INVALID: u8 = 3;
pub const DETECTION_FAILED: u8 = 4;

/// Exit with `code` and print nothing.
#[derive(Debug)]
pub struct SilentExit(pub u8);

impl fmt::Display for SilentExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit status {}", self.0)
    }
}

impl std::error::Error for SilentExit {}

pub fn code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::ProjectNotFound => PROJECT_NOT_FOUND,
        ErrorKind::ConfigInvalid => CONFIG_INVALID,
        ErrorKind::DetectionFailed => DETECTION_FAILED,
        _ => GENERAL_ERROR,
    }
}

/// Exit code for a top-level error, and whether to print it.
pub fn classify(err: &anyhow::Error) -> (u8, bool) {
    if let Some(silent) = err.downcast_ref::<SilentExit>() {
        return (silent.0, false);
    }
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<VibeError>())
        .map(|e| code_for_kind(e.kind()))
        .unwrap_or(GENERAL_ERROR);
    (code, true)
}

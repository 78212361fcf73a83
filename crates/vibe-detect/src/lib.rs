//! vibe-detect: methodology detectors.
//!
//! Each detector inspects a project directory and reports which workflow
//! methodology it follows and what stage it is in. Detectors are registered
//! in a [`DetectorRegistry`]; the arbiter in `vibe-core` picks among their
//! results.

mod artifacts;
pub mod bmad;
mod registry;
pub mod speckit;
pub mod sprint_status;

use std::path::Path;

use tokio_util::sync::CancellationToken;
use vibe_core::{DetectionResult, Method, VibeError};

pub use bmad::BmadDetector;
pub use registry::DetectorRegistry;
pub use speckit::SpeckitDetector;

/// A pluggable methodology detector.
///
/// `detect` returns `Ok(None)` when the directory does not follow this
/// methodology. The only error a detector reports is
/// [`VibeError::Cancelled`]; unreadable artifacts degrade the result
/// instead of failing it.
pub trait MethodDetector: Send + Sync {
    fn name(&self) -> Method;

    /// Cheap marker check; touches at most a couple of directory entries.
    fn can_detect(&self, path: &Path) -> bool;

    fn detect(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<DetectionResult>, VibeError>;
}

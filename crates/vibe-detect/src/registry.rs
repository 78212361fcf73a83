use std::path::Path;

use tokio_util::sync::CancellationToken;
use vibe_core::{Classification, DetectionResult, VibeError, classify};

use crate::{BmadDetector, MethodDetector, SpeckitDetector};

/// Ordered set of detectors. Registration order is the arbiter's
/// iteration order.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn MethodDetector>>,
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl DetectorRegistry {
    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Speckit first, then BMAD.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SpeckitDetector::new()));
        registry.register(Box::new(BmadDetector::new()));
        registry
    }

    pub fn register(&mut self, detector: Box<dyn MethodDetector>) {
        self.detectors.push(detector);
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector whose marker is present.
    ///
    /// Fails with `DetectionFailed` when `path` is no longer a directory and
    /// with `Cancelled` when `cancel` fires between or inside detectors.
    pub fn detect_all(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<DetectionResult>, VibeError> {
        if !path.is_dir() {
            return Err(VibeError::DetectionFailed(format!(
                "{} is not an accessible directory",
                path.display()
            )));
        }

        let mut results = Vec::new();
        for detector in &self.detectors {
            if cancel.is_cancelled() {
                return Err(VibeError::Cancelled);
            }
            if !detector.can_detect(path) {
                tracing::debug!(
                    path = %path.display(),
                    method = %detector.name(),
                    "detector marker absent, skipping"
                );
                continue;
            }
            if let Some(result) = detector.detect(path, cancel)? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Detect and arbitrate in one step.
    pub fn classify(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Classification, VibeError> {
        let results = self.detect_all(path, cancel)?;
        Ok(classify(&results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use vibe_core::{Confidence, Method, Stage};

    struct FixedDetector(Method);

    impl MethodDetector for FixedDetector {
        fn name(&self) -> Method {
            self.0
        }

        fn can_detect(&self, _path: &Path) -> bool {
            true
        }

        fn detect(
            &self,
            _path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<Option<DetectionResult>, VibeError> {
            Ok(Some(DetectionResult::new(
                self.0,
                Stage::Plan,
                Confidence::Likely,
                "fixed",
            )))
        }
    }

    #[test]
    fn plain_directory_classifies_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let c = DetectorRegistry::with_builtin()
            .classify(dir.path(), &CancellationToken::new())
            .expect("classify");
        assert_eq!(c.method, Method::Unknown);
        assert_eq!(c.reasoning, "No methodology markers found");
    }

    #[test]
    fn missing_directory_is_detection_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gone = dir.path().join("gone");
        let err = DetectorRegistry::with_builtin()
            .detect_all(&gone, &CancellationToken::new())
            .expect_err("missing dir");
        assert!(matches!(err, VibeError::DetectionFailed(_)));
    }

    #[test]
    fn custom_detectors_plug_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut registry = DetectorRegistry::empty();
        registry.register(Box::new(FixedDetector(Method::Bmad)));
        assert_eq!(registry.len(), 1);
        let c = registry
            .classify(dir.path(), &CancellationToken::new())
            .expect("classify");
        assert_eq!(c.method, Method::Bmad);
        assert_eq!(c.stage, Stage::Plan);
    }

    #[test]
    fn both_methodologies_without_timestamps_pick_first_registered() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("specs/001-a")).expect("mkdir");
        fs::create_dir_all(dir.path().join(".bmad")).expect("mkdir");
        let results = DetectorRegistry::with_builtin()
            .detect_all(dir.path(), &CancellationToken::new())
            .expect("detect");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.artifact_timestamp.is_none()));
        let c = classify(&results);
        assert_eq!(c.method, Method::Speckit);
        assert!(c.coexisting.is_empty());
    }

    #[test]
    fn cancellation_stops_detection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut registry = DetectorRegistry::empty();
        registry.register(Box::new(FixedDetector(Method::Bmad)));
        assert!(matches!(
            registry.detect_all(dir.path(), &cancel),
            Err(VibeError::Cancelled)
        ));
    }
}

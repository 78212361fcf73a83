//! On-disk layout of the storage root.
//!
//! ```text
//! <root>/config.yaml            global settings
//! <root>/metrics.db             stage-transition log
//! <root>/<dir>/.project-path    allocator marker
//! <root>/<dir>/config.yaml      per-project config
//! <root>/<dir>/state.db         per-project state
//! ```

use std::path::{Path, PathBuf};

use vibe_core::VibeError;

pub const MARKER_FILE: &str = ".project-path";
pub const CONFIG_FILE: &str = "config.yaml";
pub const STATE_DB_FILE: &str = "state.db";
pub const METRICS_DB_FILE: &str = "metrics.db";
const DEFAULT_DIR_NAME: &str = ".vibe-dash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<home>/.vibe-dash`.
    pub fn default_root() -> Result<PathBuf, VibeError> {
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_DIR_NAME))
            .ok_or_else(|| {
                VibeError::ConfigInvalid("cannot determine home directory".to_string())
            })
    }

    /// Use `root` when given, otherwise [`StorageLayout::default_root`].
    pub fn resolve(root: Option<PathBuf>) -> Result<Self, VibeError> {
        match root {
            Some(root) => Ok(Self::new(root)),
            None => Ok(Self::new(Self::default_root()?)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn metrics_db_path(&self) -> PathBuf {
        self.root.join(METRICS_DB_FILE)
    }

    pub fn project_dir(&self, dir_name: &str) -> PathBuf {
        self.root.join(dir_name)
    }

    pub fn marker_path(&self, dir_name: &str) -> PathBuf {
        self.project_dir(dir_name).join(MARKER_FILE)
    }

    pub fn project_config_path(&self, dir_name: &str) -> PathBuf {
        self.project_dir(dir_name).join(CONFIG_FILE)
    }

    pub fn state_db_path(&self, dir_name: &str) -> PathBuf {
        self.project_dir(dir_name).join(STATE_DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let layout = StorageLayout::new("/data/vibe");
        assert_eq!(layout.settings_path(), Path::new("/data/vibe/config.yaml"));
        assert_eq!(layout.metrics_db_path(), Path::new("/data/vibe/metrics.db"));
        assert_eq!(
            layout.marker_path("api"),
            Path::new("/data/vibe/api/.project-path")
        );
        assert_eq!(
            layout.state_db_path("api"),
            Path::new("/data/vibe/api/state.db")
        );
        assert_eq!(
            layout.project_config_path("api"),
            Path::new("/data/vibe/api/config.yaml")
        );
    }

    #[test]
    fn explicit_root_wins() {
        let layout = StorageLayout::resolve(Some(PathBuf::from("/x"))).expect("resolve");
        assert_eq!(layout.root(), Path::new("/x"));
    }
}

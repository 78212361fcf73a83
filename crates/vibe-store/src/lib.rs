//! vibe-store: everything vibe-dash keeps on disk outside the metrics log.
//!
//! - [`canonical`]: path canonicalization (project identity)
//! - [`allocator`]: per-project directory allocation under the storage root
//! - [`config`]: global settings and per-project YAML config
//! - [`state_db`]: per-project SQLite state
//!
//! [`Storage`] ties them together for the engine. All of it is blocking
//! I/O; async callers go through `spawn_blocking`.

pub mod allocator;
pub mod canonical;
pub mod config;
pub mod layout;
pub mod state_db;

use std::path::Path;

use vibe_core::{Project, VibeError};

pub use allocator::DirectoryAllocator;
pub use canonical::canonicalize;
pub use config::{ConfigKey, ProjectConfig, Settings};
pub use layout::StorageLayout;
pub use state_db::ProjectDb;

/// A project loaded from disk at startup.
#[derive(Debug, Clone)]
pub struct StoredProject {
    pub dir_name: String,
    pub project: Project,
    pub config: ProjectConfig,
}

pub struct Storage {
    layout: StorageLayout,
    allocator: DirectoryAllocator,
}

impl Storage {
    /// Open the storage root, creating it and rebuilding the allocator
    /// mapping from the markers on disk.
    pub fn open(layout: StorageLayout) -> Result<Self, VibeError> {
        let allocator = DirectoryAllocator::open(layout.root())?;
        Ok(Self { layout, allocator })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn allocator(&self) -> &DirectoryAllocator {
        &self.allocator
    }

    pub fn load_settings(&self) -> Result<Settings, VibeError> {
        Settings::load(&self.layout.settings_path())
    }

    pub fn allocate(&self, canonical: &Path) -> Result<String, VibeError> {
        self.allocator.allocate(canonical)
    }

    /// Forget the project and best-effort remove its directory.
    pub fn release(&self, canonical: &Path) -> Option<String> {
        self.allocator.release(canonical)
    }

    pub fn save_project(&self, dir_name: &str, project: &Project) -> Result<(), VibeError> {
        ProjectDb::open(&self.layout.state_db_path(dir_name))?.save(project)
    }

    pub fn load_project(&self, dir_name: &str) -> Result<Option<Project>, VibeError> {
        let path = self.layout.state_db_path(dir_name);
        if !path.is_file() {
            return Ok(None);
        }
        ProjectDb::open(&path)?.load()
    }

    pub fn load_config(&self, dir_name: &str) -> Result<ProjectConfig, VibeError> {
        ProjectConfig::load(&self.layout.project_config_path(dir_name))
    }

    pub fn save_config(&self, dir_name: &str, config: &ProjectConfig) -> Result<(), VibeError> {
        config.save(&self.layout.project_config_path(dir_name))
    }

    /// Delete the per-project state database, keeping config and marker.
    pub fn reset_state(&self, dir_name: &str) -> Result<(), VibeError> {
        state_db::remove_state_files(&self.layout.state_db_path(dir_name))
    }

    /// Load every project whose directory has a marker and a readable
    /// state database. Anything else is skipped with a warning.
    pub fn load_all(&self) -> Vec<StoredProject> {
        let mut loaded = Vec::new();
        for (canonical, dir_name) in self.allocator.mappings() {
            match self.load_stored(&canonical, &dir_name) {
                Ok(Some(stored)) => loaded.push(stored),
                Ok(None) => {
                    tracing::warn!(
                        dir = %dir_name,
                        path = %canonical.display(),
                        "project directory has no state database, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        dir = %dir_name,
                        path = %canonical.display(),
                        error = %e,
                        "failed to load project, skipping"
                    );
                }
            }
        }
        loaded
    }

    fn load_stored(
        &self,
        canonical: &Path,
        dir_name: &str,
    ) -> Result<Option<StoredProject>, VibeError> {
        let Some(project) = self.load_project(dir_name)? else {
            return Ok(None);
        };
        if project.canonical_path != canonical {
            return Err(VibeError::storage(
                "load project",
                format!(
                    "state database path {} does not match marker {}",
                    project.canonical_path.display(),
                    canonical.display()
                ),
            ));
        }
        let config = self.load_config(dir_name)?;
        Ok(Some(StoredProject {
            dir_name: dir_name.to_string(),
            project,
            config,
        }))
    }
}

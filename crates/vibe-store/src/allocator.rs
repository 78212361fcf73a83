//! Deterministic, collision-free project directory allocation.
//!
//! Each allocated directory holds a `.project-path` marker with the
//! canonical path it belongs to. The markers are the persisted mapping: on
//! open they are scanned to rebuild `canonical_path -> dir_name`, and during
//! allocation they decide whether an existing directory is ours or a
//! collision.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use vibe_core::VibeError;
use vibe_core::naming::{MAX_COLLISION_DEPTH, candidate};

use crate::layout::MARKER_FILE;

pub struct DirectoryAllocator {
    root: PathBuf,
    /// Serializes directory creation within this process.
    alloc_lock: Mutex<()>,
    mapping: Mutex<HashMap<PathBuf, String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DirectoryAllocator {
    /// Open the allocator over `root`, creating it if needed, and rebuild
    /// the mapping from the markers found there.
    pub fn open(root: &Path) -> Result<Self, VibeError> {
        fs::create_dir_all(root)
            .map_err(|e| VibeError::io(format!("create storage root {}", root.display()), e))?;

        let mut mapping = HashMap::new();
        let entries = fs::read_dir(root)
            .map_err(|e| VibeError::io(format!("read storage root {}", root.display()), e))?;
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let dir = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            match read_marker(&dir) {
                Ok(Some(canonical)) => {
                    if let Some(previous) = mapping.insert(canonical.clone(), name.clone()) {
                        tracing::warn!(
                            path = %canonical.display(),
                            first = %previous,
                            second = %name,
                            "two directories claim the same project path"
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), "unreadable project marker: {e}");
                }
            }
        }

        tracing::debug!(root = %root.display(), projects = mapping.len(), "allocator opened");
        Ok(Self {
            root: root.to_path_buf(),
            alloc_lock: Mutex::new(()),
            mapping: Mutex::new(mapping),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name already assigned to `canonical`, if any.
    pub fn lookup(&self, canonical: &Path) -> Option<String> {
        lock(&self.mapping).get(canonical).cloned()
    }

    /// Every known `(canonical_path, dir_name)` pair, sorted by directory.
    pub fn mappings(&self) -> Vec<(PathBuf, String)> {
        let mut pairs: Vec<_> = lock(&self.mapping)
            .iter()
            .map(|(path, name)| (path.clone(), name.clone()))
            .collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1));
        pairs
    }

    /// Assign a directory to `canonical`, creating it and its marker.
    ///
    /// Idempotent: the same path always gets the same name.
    pub fn allocate(&self, canonical: &Path) -> Result<String, VibeError> {
        let _guard = lock(&self.alloc_lock);

        if let Some(name) = self.lookup(canonical) {
            self.ensure_dir(&name, canonical)?;
            return Ok(name);
        }

        for depth in 0..MAX_COLLISION_DEPTH {
            let Some(name) = candidate(canonical, depth) else {
                break;
            };
            if name.is_empty() {
                continue;
            }

            let dir = self.root.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    mark_or_remove(&dir, |dir| write_marker(dir, canonical))?;
                    return Ok(self.remember(canonical, name));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => match read_marker(&dir) {
                    Ok(Some(owner)) if owner == canonical => {
                        return Ok(self.remember(canonical, name));
                    }
                    Ok(Some(owner)) => {
                        tracing::debug!(
                            candidate = %name,
                            owner = %owner.display(),
                            depth,
                            "directory name taken, trying deeper"
                        );
                    }
                    Ok(None) | Err(_) => {
                        tracing::debug!(candidate = %name, "directory exists without marker");
                    }
                },
                Err(e) => {
                    return Err(VibeError::io(format!("create {}", dir.display()), e));
                }
            }
        }

        Err(VibeError::CollisionUnresolvable {
            path: canonical.to_path_buf(),
            depth: MAX_COLLISION_DEPTH,
        })
    }

    /// Forget `canonical` and remove its directory. Removal is best-effort.
    pub fn release(&self, canonical: &Path) -> Option<String> {
        let _guard = lock(&self.alloc_lock);
        let name = lock(&self.mapping).remove(canonical)?;
        let dir = self.root.join(&name);
        if let Err(e) = fs::remove_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), "failed to remove project directory: {e}");
        }
        Some(name)
    }

    fn remember(&self, canonical: &Path, name: String) -> String {
        lock(&self.mapping).insert(canonical.to_path_buf(), name.clone());
        tracing::debug!(path = %canonical.display(), dir = %name, "directory allocated");
        name
    }

    /// Recreate a mapped directory that was removed behind our back.
    fn ensure_dir(&self, name: &str, canonical: &Path) -> Result<(), VibeError> {
        let dir = self.root.join(name);
        if dir.join(MARKER_FILE).is_file() {
            return Ok(());
        }
        fs::create_dir_all(&dir)
            .map_err(|e| VibeError::io(format!("create {}", dir.display()), e))?;
        write_marker(&dir, canonical)
    }
}

/// Run `mark` on a freshly created `dir`, removing the directory if it fails.
/// Never leaves an unmarked directory behind.
fn mark_or_remove(
    dir: &Path,
    mark: impl FnOnce(&Path) -> Result<(), VibeError>,
) -> Result<(), VibeError> {
    mark(dir).inspect_err(|_| {
        if let Err(e) = fs::remove_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot remove unmarked directory");
        }
    })
}

fn write_marker(dir: &Path, canonical: &Path) -> Result<(), VibeError> {
    let marker = dir.join(MARKER_FILE);
    fs::write(&marker, format!("{}\n", canonical.display()))
        .map_err(|e| VibeError::io(format!("write {}", marker.display()), e))
}

/// Canonical path stored in `dir`'s marker; `None` when there is no marker.
pub fn read_marker(dir: &Path) -> io::Result<Option<PathBuf>> {
    match fs::read_to_string(dir.join(MARKER_FILE)) {
        Ok(text) => {
            let line = text.lines().next().unwrap_or("");
            if line.is_empty() {
                Ok(None)
            } else {
                Ok(Some(PathBuf::from(line)))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_project_gets_leaf_name() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        let name = alloc.allocate(Path::new("/home/dev/api")).expect("allocate");
        assert_eq!(name, "api");
        assert_eq!(
            read_marker(&root.path().join("api")).expect("marker"),
            Some(PathBuf::from("/home/dev/api"))
        );
    }

    #[test]
    fn allocation_is_idempotent() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        let a = alloc.allocate(Path::new("/w/api")).expect("first");
        let b = alloc.allocate(Path::new("/w/api")).expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn collision_moves_one_level_up() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        assert_eq!(alloc.allocate(Path::new("/w/a/api")).expect("a"), "api");
        assert_eq!(alloc.allocate(Path::new("/w/b/api")).expect("b"), "b-api");
    }

    #[test]
    fn mapping_survives_reopen() {
        let root = tempfile::tempdir().expect("tempdir");
        {
            let alloc = DirectoryAllocator::open(root.path()).expect("open");
            alloc.allocate(Path::new("/w/a/api")).expect("a");
            alloc.allocate(Path::new("/w/b/api")).expect("b");
        }
        let alloc = DirectoryAllocator::open(root.path()).expect("reopen");
        assert_eq!(alloc.lookup(Path::new("/w/b/api")).as_deref(), Some("b-api"));
        assert_eq!(alloc.allocate(Path::new("/w/b/api")).expect("again"), "b-api");
        assert_eq!(alloc.mappings().len(), 2);
    }

    #[test]
    fn failed_marker_write_releases_the_name() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        let dir = root.path().join("api");
        fs::create_dir(&dir).expect("mkdir");

        let err = mark_or_remove(&dir, |_| {
            Err(VibeError::io("write marker", io::Error::other("disk full")))
        })
        .expect_err("marker failure surfaces");
        assert!(matches!(err, VibeError::Io { .. }));
        assert!(!dir.exists());

        assert_eq!(alloc.allocate(Path::new("/w/api")).expect("allocate"), "api");
    }

    #[test]
    fn foreign_directory_without_marker_is_skipped() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join("api")).expect("mkdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        assert_eq!(alloc.allocate(Path::new("/w/x/api")).expect("alloc"), "x-api");
    }

    #[test]
    fn non_ascii_leaf_skips_to_parent() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        let name = alloc.allocate(Path::new("/w/proj/日本")).expect("alloc");
        assert_eq!(name, "proj");
    }

    #[test]
    fn release_forgets_and_removes() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        alloc.allocate(Path::new("/w/api")).expect("alloc");
        assert_eq!(alloc.release(Path::new("/w/api")).as_deref(), Some("api"));
        assert!(!root.path().join("api").exists());
        assert!(alloc.lookup(Path::new("/w/api")).is_none());
        assert!(alloc.release(Path::new("/w/api")).is_none());
    }

    #[test]
    fn removed_directory_is_recreated_on_allocate() {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");
        alloc.allocate(Path::new("/w/api")).expect("alloc");
        fs::remove_dir_all(root.path().join("api")).expect("rm");
        assert_eq!(alloc.allocate(Path::new("/w/api")).expect("again"), "api");
        assert!(root.path().join("api").join(MARKER_FILE).is_file());
    }
}

//! The project state engine.
//!
//! [`StateEngine`] owns the in-memory project set. Every mutation follows
//! the same path: take the project's write lock, copy the entry, change the
//! copy, persist it with blocking I/O off the runtime, then publish it back
//! into the map. The map mutex is only ever held for map access.
//!
//! Per project there are two async locks, always taken in this order:
//! `detect` serializes re-detections, `write` serializes read-modify-persist.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vibe_core::identity::is_project_id;
use vibe_core::policy::should_hibernate;
use vibe_core::{
    Classification, FileEvent, Project, ProjectState, Stage, Trigger, VibeError, apply_trigger,
    project_id,
};
use vibe_detect::DetectorRegistry;
use vibe_metrics::MetricsRecorder;
use vibe_store::{ConfigKey, Settings, Storage, StorageLayout, canonicalize};
use vibe_watcher::FileWatcher;

use crate::snapshot::{Entry, ProjectSnapshot};

// ─── Public helper types ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteAction {
    On,
    Off,
    Toggle,
}

/// Outcome of [`StateEngine::refresh_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

// ─── Internals ────────────────────────────────────────────────────

#[derive(Default)]
struct ProjectLocks {
    detect: tokio::sync::Mutex<()>,
    write: tokio::sync::Mutex<()>,
}

pub(crate) struct Inner {
    pub(crate) storage: Storage,
    registry: DetectorRegistry,
    pub(crate) recorder: MetricsRecorder,
    pub(crate) watcher: FileWatcher,
    pub(crate) settings: Settings,
    pub(crate) cancel: CancellationToken,
    /// Resolved storage root. Events under it are the engine's own writes.
    storage_root: PathBuf,
    projects: Mutex<BTreeMap<String, Entry>>,
    locks: Mutex<HashMap<String, Arc<ProjectLocks>>>,
    /// Scheduled re-detections; `true` means another run was requested
    /// while one was in flight.
    redetect: Mutex<HashMap<String, bool>>,
    pool: Arc<Semaphore>,
    pub(crate) tasks: TaskTracker,
    pub(crate) watching: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-scoped engine handle. Cheap to clone.
#[derive(Clone)]
pub struct StateEngine {
    pub(crate) inner: Arc<Inner>,
}

impl StateEngine {
    /// Open the storage root, load settings and every stored project, and
    /// build the recorder and watcher. Nothing is watched until [`run`].
    ///
    /// [`run`]: StateEngine::run
    pub async fn open(layout: StorageLayout, cancel: CancellationToken) -> Result<Self, VibeError> {
        let (storage, settings, stored, storage_root) = tokio::task::spawn_blocking(move || {
            let storage = Storage::open(layout)?;
            let settings = storage.load_settings()?;
            let stored = storage.load_all();
            let root = storage.layout().root();
            let storage_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
            Ok::<_, VibeError>((storage, settings, stored, storage_root))
        })
        .await
        .map_err(join_error)??;

        let recorder = MetricsRecorder::new(
            storage.layout().metrics_db_path(),
            settings.metrics_debounce(),
            cancel.clone(),
        );
        let watcher = FileWatcher::new(settings.watch_debounce(), cancel.clone());

        let mut projects = BTreeMap::new();
        for s in stored {
            recorder.seed(&s.project.id, s.project.current_stage);
            projects.insert(
                s.project.id.clone(),
                Entry {
                    dir_name: s.dir_name,
                    project: s.project,
                    config: s.config,
                },
            );
        }

        tracing::debug!(
            root = %storage.layout().root().display(),
            projects = projects.len(),
            "engine opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                pool: Arc::new(Semaphore::new(settings.redetect_concurrency)),
                storage,
                registry: DetectorRegistry::with_builtin(),
                recorder,
                watcher,
                settings,
                cancel,
                storage_root,
                projects: Mutex::new(projects),
                locks: Mutex::new(HashMap::new()),
                redetect: Mutex::new(HashMap::new()),
                tasks: TaskTracker::new(),
                watching: AtomicBool::new(false),
            }),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn layout(&self) -> &StorageLayout {
        self.inner.storage.layout()
    }

    pub fn recorder(&self) -> &MetricsRecorder {
        &self.inner.recorder
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.projects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Reads ────────────────────────────────────────────────────

    /// Resolve an id, name, display name, or path to a project id.
    ///
    /// Names are matched in id order, so an ambiguous name resolves to the
    /// project with the smallest id.
    pub async fn resolve(&self, identifier: &str) -> Result<String, VibeError> {
        {
            let projects = lock(&self.inner.projects);
            if is_project_id(identifier) && projects.contains_key(identifier) {
                return Ok(identifier.to_string());
            }
            let by_name = projects.values().find(|e| {
                e.project.display_name.as_deref() == Some(identifier)
                    || e.project.name == identifier
            });
            if let Some(e) = by_name {
                return Ok(e.project.id.clone());
            }
        }

        let raw = identifier.to_string();
        if let Ok(Ok(canonical)) = tokio::task::spawn_blocking(move || canonicalize(&raw)).await {
            let id = project_id(&canonical);
            if lock(&self.inner.projects).contains_key(&id) {
                return Ok(id);
            }
        }
        Err(VibeError::ProjectNotFound(identifier.to_string()))
    }

    pub async fn get(&self, identifier: &str) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        let entry = self.entry(&id)?;
        Ok(entry.snapshot(&self.inner.settings, Utc::now()))
    }

    /// Every project, ordered by label (case-insensitive) then id.
    pub fn list(&self) -> Vec<ProjectSnapshot> {
        self.list_at(Utc::now())
    }

    pub fn list_at(&self, now: DateTime<Utc>) -> Vec<ProjectSnapshot> {
        let mut snapshots: Vec<ProjectSnapshot> = lock(&self.inner.projects)
            .values()
            .map(|e| e.snapshot(&self.inner.settings, now))
            .collect();
        snapshots.sort_by(|a, b| {
            a.label()
                .to_lowercase()
                .cmp(&b.label().to_lowercase())
                .then_with(|| a.id().cmp(b.id()))
        });
        snapshots
    }

    pub(crate) fn tracked_paths(&self) -> Vec<PathBuf> {
        lock(&self.inner.projects)
            .values()
            .map(|e| e.project.canonical_path.clone())
            .collect()
    }

    fn entry(&self, id: &str) -> Result<Entry, VibeError> {
        lock(&self.inner.projects)
            .get(id)
            .cloned()
            .ok_or_else(|| VibeError::ProjectNotFound(id.to_string()))
    }

    fn locks_for(&self, id: &str) -> Arc<ProjectLocks> {
        Arc::clone(lock(&self.inner.locks).entry(id.to_string()).or_default())
    }

    // ─── Track / untrack ──────────────────────────────────────────

    /// Start tracking `path`: canonicalize, allocate a directory, detect,
    /// persist, and watch it when the watch loop is running.
    pub async fn track(
        &self,
        path: &str,
        display_name: Option<String>,
    ) -> Result<ProjectSnapshot, VibeError> {
        let raw = path.to_string();
        let canonical = tokio::task::spawn_blocking(move || canonicalize(&raw))
            .await
            .map_err(join_error)??;
        let id = project_id(&canonical);
        if lock(&self.inner.projects).contains_key(&id) {
            return Err(VibeError::ProjectAlreadyExists(canonical));
        }

        let locks = self.locks_for(&id);
        let _detect = locks.detect.lock().await;
        let _write = locks.write.lock().await;
        if lock(&self.inner.projects).contains_key(&id) {
            return Err(VibeError::ProjectAlreadyExists(canonical));
        }

        let inner = Arc::clone(&self.inner);
        let display_name = display_name.filter(|n| !n.trim().is_empty());
        let entry = tokio::task::spawn_blocking(move || inner.create_entry(canonical, display_name))
            .await
            .map_err(join_error)??;

        let stage = entry.project.current_stage;
        let snapshot = entry.snapshot(&self.inner.settings, Utc::now());
        let path = entry.project.canonical_path.clone();
        lock(&self.inner.projects).insert(id.clone(), entry);

        self.inner.recorder.on_detection(&id, stage);
        if self.inner.watching.load(Ordering::SeqCst) {
            if let Err(e) = self.inner.watcher.add_path(&path) {
                tracing::warn!(project_id = %id, error = %e, "tracked project is not watched");
            }
        }

        tracing::info!(
            project_id = %id,
            path = %path.display(),
            method = %snapshot.project.detected_method,
            stage = %stage,
            "project tracked"
        );
        Ok(snapshot)
    }

    /// Stop tracking. The project's storage directory is removed
    /// best-effort.
    pub async fn untrack(&self, identifier: &str) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        let locks = self.locks_for(&id);
        let _detect = locks.detect.lock().await;
        let _write = locks.write.lock().await;

        let entry = lock(&self.inner.projects)
            .remove(&id)
            .ok_or_else(|| VibeError::ProjectNotFound(identifier.to_string()))?;
        lock(&self.inner.locks).remove(&id);

        let path = entry.project.canonical_path.clone();
        self.inner.watcher.remove_path(&path);
        self.inner.recorder.forget(&id);

        let inner = Arc::clone(&self.inner);
        let release_path = path.clone();
        tokio::task::spawn_blocking(move || inner.storage.release(&release_path))
            .await
            .map_err(join_error)?;

        tracing::info!(project_id = %id, path = %path.display(), "project untracked");
        Ok(entry.snapshot(&self.inner.settings, Utc::now()))
    }

    // ─── Mutators ─────────────────────────────────────────────────

    /// Set or clear the display name. An empty name clears it.
    pub async fn rename(
        &self,
        identifier: &str,
        display_name: Option<String>,
    ) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        let display_name = display_name.filter(|n| !n.trim().is_empty());
        self.update(&id, Utc::now(), |entry, _| {
            entry.project.display_name = display_name;
            Ok(())
        })
        .await
    }

    /// Favoriting a hibernated project also activates it.
    pub async fn favorite(
        &self,
        identifier: &str,
        action: FavoriteAction,
    ) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        self.update(&id, Utc::now(), |entry, now| {
            let on = match action {
                FavoriteAction::On => true,
                FavoriteAction::Off => false,
                FavoriteAction::Toggle => !entry.project.is_favorite,
            };
            if on && entry.project.state == ProjectState::Hibernated {
                apply_trigger(&mut entry.project, Trigger::Activate, now)?;
            }
            entry.project.is_favorite = on;
            Ok(())
        })
        .await
    }

    /// Notes live in both the state database and the project config.
    pub async fn set_notes(&self, identifier: &str, notes: &str) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        let notes = notes.to_string();
        self.update(&id, Utc::now(), |entry, _| {
            entry.project.notes = notes.clone();
            entry.config.notes = notes;
            Ok(())
        })
        .await
    }

    /// Active to Hibernated. Idempotent; refused for favorites.
    pub async fn hibernate(&self, identifier: &str) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        let snapshot = self
            .update(&id, Utc::now(), |entry, now| {
                apply_trigger(&mut entry.project, Trigger::Hibernate, now).map(|_| ())
            })
            .await?;
        tracing::info!(project_id = %id, "project hibernated");
        Ok(snapshot)
    }

    /// Hibernated to Active. Idempotent.
    pub async fn activate(&self, identifier: &str) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        let snapshot = self
            .update(&id, Utc::now(), |entry, now| {
                apply_trigger(&mut entry.project, Trigger::Activate, now).map(|_| ())
            })
            .await?;
        tracing::info!(project_id = %id, "project activated");
        Ok(snapshot)
    }

    /// Set a per-project config key from its CLI spelling.
    pub async fn set_config(
        &self,
        identifier: &str,
        key: &str,
        value: &str,
    ) -> Result<ProjectSnapshot, VibeError> {
        let key: ConfigKey = key.parse()?;
        let id = self.resolve(identifier).await?;
        let value = value.to_string();
        self.update(&id, Utc::now(), move |entry, _| entry.config.set(key, &value))
            .await
    }

    /// Destructive reinit: drop the state database, keep config and marker,
    /// rebuild and re-detect. Requires `confirmed`.
    pub async fn reset(&self, identifier: &str, confirmed: bool) -> Result<ProjectSnapshot, VibeError> {
        let id = self.resolve(identifier).await?;
        if !confirmed {
            let label = self.entry(&id)?.project.label().to_string();
            return Err(VibeError::ConfirmationRequired(format!(
                "reset of {label} deletes its state; pass --confirm"
            )));
        }

        let locks = self.locks_for(&id);
        let _detect = locks.detect.lock().await;
        let _write = locks.write.lock().await;
        let old = self.entry(&id)?;

        let inner = Arc::clone(&self.inner);
        let fresh = tokio::task::spawn_blocking(move || inner.reset_entry(old))
            .await
            .map_err(join_error)??;

        let stage = fresh.project.current_stage;
        let snapshot = fresh.snapshot(&self.inner.settings, Utc::now());
        {
            let mut projects = lock(&self.inner.projects);
            if let Some(slot) = projects.get_mut(&id) {
                *slot = fresh;
            }
        }
        self.inner.recorder.forget(&id);
        self.inner.recorder.on_detection(&id, stage);

        tracing::info!(project_id = %id, stage = %stage, "project state reset");
        Ok(snapshot)
    }

    /// Read-modify-persist under the project's write lock. Only changed
    /// parts are written; `updated_at` moves only when the project changed.
    async fn update<F>(&self, id: &str, now: DateTime<Utc>, f: F) -> Result<ProjectSnapshot, VibeError>
    where
        F: FnOnce(&mut Entry, DateTime<Utc>) -> Result<(), VibeError>,
    {
        let locks = self.locks_for(id);
        let _write = locks.write.lock().await;

        let before = self.entry(id)?;
        let mut after = before.clone();
        f(&mut after, now)?;

        let project_changed = after.project != before.project;
        let config_changed = after.config != before.config;
        if project_changed {
            after.project.updated_at = now;
        }
        if project_changed || config_changed {
            let inner = Arc::clone(&self.inner);
            let to_save = after.clone();
            tokio::task::spawn_blocking(move || {
                if config_changed {
                    inner.storage.save_config(&to_save.dir_name, &to_save.config)?;
                }
                if project_changed {
                    inner.storage.save_project(&to_save.dir_name, &to_save.project)?;
                }
                Ok::<_, VibeError>(())
            })
            .await
            .map_err(join_error)??;

            let mut projects = lock(&self.inner.projects);
            match projects.get_mut(id) {
                Some(slot) => *slot = after.clone(),
                None => return Err(VibeError::ProjectNotFound(id.to_string())),
            }
        }
        Ok(after.snapshot(&self.inner.settings, now))
    }

    // ─── Detection ────────────────────────────────────────────────

    /// Re-detect one project now. Returns whether the stage changed.
    /// On failure the previous classification is kept.
    pub async fn redetect(&self, id: &str) -> Result<bool, VibeError> {
        let locks = self.locks_for(id);
        let _detect = locks.detect.lock().await;

        let path = self.entry(id)?.project.canonical_path;
        let inner = Arc::clone(&self.inner);
        let classification = tokio::task::spawn_blocking(move || {
            inner.registry.classify(&path, &inner.cancel)
        })
        .await
        .map_err(join_error)??;

        let mut previous_stage = Stage::Unknown;
        let new_stage = classification.stage;
        self.update(id, Utc::now(), |entry, _| {
            previous_stage = entry.project.current_stage;
            apply_classification(&mut entry.project, classification);
            Ok(())
        })
        .await?;

        let changed = previous_stage != new_stage;
        if changed {
            tracing::debug!(
                project_id = %id,
                from = %previous_stage,
                to = %new_stage,
                "stage changed"
            );
            self.inner.recorder.on_detection(id, new_stage);
        }
        Ok(changed)
    }

    /// Re-detect every project. Fails only when every project failed.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, VibeError> {
        let ids: Vec<String> = lock(&self.inner.projects).keys().cloned().collect();
        let mut set = JoinSet::new();
        for id in ids {
            let engine = self.clone();
            let pool = Arc::clone(&self.inner.pool);
            set.spawn(async move {
                let _permit = pool.acquire_owned().await;
                let result = engine.redetect(&id).await;
                (id, result)
            });
        }

        let mut summary = RefreshSummary::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(_))) => summary.refreshed += 1,
                Ok((id, Err(e))) => {
                    tracing::warn!(project_id = %id, error = %e, "refresh failed for project");
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "refresh task failed");
                    summary.failed += 1;
                }
            }
        }

        if summary.failed > 0 && summary.refreshed == 0 {
            return Err(VibeError::DetectionFailed(format!(
                "all {} projects failed to refresh",
                summary.failed
            )));
        }
        Ok(summary)
    }

    /// Queue a re-detection. Requests for a project that is already queued
    /// or running coalesce into one follow-up run.
    pub fn schedule_redetect(&self, id: &str) {
        {
            let mut queued = lock(&self.inner.redetect);
            if let Some(again) = queued.get_mut(id) {
                *again = true;
                return;
            }
            queued.insert(id.to_string(), false);
        }

        let engine = self.clone();
        let id = id.to_string();
        self.inner.tasks.spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = engine.inner.cancel.cancelled() => None,
                    permit = Arc::clone(&engine.inner.pool).acquire_owned() => permit.ok(),
                };
                let stop = match permit {
                    None => true,
                    Some(_permit) => match engine.redetect(&id).await {
                        Ok(_) => false,
                        Err(VibeError::Cancelled | VibeError::ProjectNotFound(_)) => true,
                        Err(e) => {
                            tracing::warn!(project_id = %id, error = %e, "re-detection failed");
                            false
                        }
                    },
                };
                if !finish_pass(&mut lock(&engine.inner.redetect), &id, stop) {
                    break;
                }
            }
        });
    }

    /// Re-detections queued or running.
    pub fn pending_redetections(&self) -> usize {
        lock(&self.inner.redetect).len()
    }

    /// Wait until every scheduled re-detection has finished.
    pub async fn settle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    // ─── Activity and hibernation ─────────────────────────────────

    /// Record activity for the project containing `event.path` (longest
    /// prefix wins), auto-activate it if hibernated, and schedule a
    /// re-detection. Returns the matched project id. Events under the
    /// storage root are ignored.
    pub async fn on_file_event(&self, event: FileEvent) -> Result<Option<String>, VibeError> {
        if self.is_own_write(&event.path) {
            tracing::debug!(path = %event.path.display(), "event under storage root");
            return Ok(None);
        }
        let id = {
            let projects = lock(&self.inner.projects);
            projects
                .values()
                .filter(|e| event.path.starts_with(&e.project.canonical_path))
                .max_by_key(|e| e.project.canonical_path.components().count())
                .map(|e| e.project.id.clone())
        };
        let Some(id) = id else {
            tracing::debug!(path = %event.path.display(), "event outside every project");
            return Ok(None);
        };

        let at = event.timestamp;
        let mut activated = false;
        self.update(&id, Utc::now(), |entry, now| {
            if at > entry.project.last_activity_at {
                entry.project.last_activity_at = at;
            }
            activated = apply_trigger(&mut entry.project, Trigger::FileActivity, now)?;
            Ok(())
        })
        .await?;

        if activated {
            tracing::info!(project_id = %id, path = %event.path.display(), "project auto-activated");
        } else {
            tracing::debug!(
                project_id = %id,
                path = %event.path.display(),
                op = %event.operation,
                "activity recorded"
            );
        }
        self.schedule_redetect(&id);
        Ok(Some(id))
    }

    fn is_own_write(&self, path: &std::path::Path) -> bool {
        path.starts_with(&self.inner.storage_root) || path.starts_with(self.layout().root())
    }

    /// Hibernate every Active, non-favorite project inactive for at least
    /// its hibernation period. Returns the ids that were hibernated.
    pub async fn sweep_for_hibernation(&self, now: DateTime<Utc>) -> Vec<String> {
        let due: Vec<String> = lock(&self.inner.projects)
            .values()
            .filter(|e| should_hibernate(&e.project, now, e.hibernation_days(&self.inner.settings)))
            .map(|e| e.project.id.clone())
            .collect();

        let mut hibernated = Vec::new();
        for id in due {
            let settings = &self.inner.settings;
            let mut changed = false;
            let result = self
                .update(&id, now, |entry, now| {
                    // Re-check: activity may have arrived since the scan.
                    if should_hibernate(&entry.project, now, entry.hibernation_days(settings)) {
                        changed = apply_trigger(&mut entry.project, Trigger::Sweep, now)?;
                    }
                    Ok(())
                })
                .await;
            match result {
                Ok(_) if changed => {
                    tracing::info!(project_id = %id, "project hibernated after inactivity");
                    hibernated.push(id);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(project_id = %id, error = %e, "hibernation sweep failed"),
            }
        }
        hibernated
    }
}

// ─── Blocking work ────────────────────────────────────────────────

impl Inner {
    fn create_entry(
        &self,
        canonical: PathBuf,
        display_name: Option<String>,
    ) -> Result<Entry, VibeError> {
        let dir_name = self.storage.allocate(&canonical)?;
        let built = self.build_entry(&dir_name, canonical.clone(), |project| {
            project.display_name = display_name;
        });
        if built.is_err() {
            self.storage.release(&canonical);
        }
        built
    }

    fn reset_entry(&self, old: Entry) -> Result<Entry, VibeError> {
        self.storage.reset_state(&old.dir_name)?;
        self.build_entry(&old.dir_name, old.project.canonical_path, |_| {})
    }

    /// Fresh project record: config loaded from disk, detection run,
    /// state database written.
    fn build_entry(
        &self,
        dir_name: &str,
        canonical: PathBuf,
        customize: impl FnOnce(&mut Project),
    ) -> Result<Entry, VibeError> {
        let config = self.storage.load_config(dir_name)?;
        let mut project = Project::new(canonical, Utc::now());
        project.notes = config.notes.clone();
        customize(&mut project);

        let classification = self.registry.classify(&project.canonical_path, &self.cancel)?;
        apply_classification(&mut project, classification);
        self.storage.save_project(dir_name, &project)?;

        Ok(Entry {
            dir_name: dir_name.to_string(),
            project,
            config,
        })
    }
}

fn apply_classification(project: &mut Project, c: Classification) {
    project.detected_method = c.method;
    project.current_stage = c.stage;
    project.confidence = c.confidence;
    project.detection_reasoning = c.reasoning;
    project.coexisting_methods = c.coexisting;
}

/// Close one re-detection pass for `id`. Returns whether another pass was
/// requested meanwhile; otherwise the entry is removed under the same guard,
/// so a later request always spawns a fresh run.
fn finish_pass(queued: &mut HashMap<String, bool>, id: &str, stop: bool) -> bool {
    match queued.get_mut(id) {
        Some(again) if *again && !stop => {
            *again = false;
            true
        }
        _ => {
            queued.remove(id);
            false
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> VibeError {
    VibeError::storage("background task", e)
}

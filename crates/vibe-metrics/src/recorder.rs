//! Debounced stage-transition recording.
//!
//! Every detection reports the stage it saw. A change opens (or extends) a
//! per-project window; when no further change arrives for the debounce
//! period, one transition is written from the stage seen when the window
//! opened to the last stage seen. Rapid `plan -> tasks -> implement` churn
//! therefore collapses into a single record.
//!
//! Write failures never reach the caller: they are logged and counted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use vibe_core::{Stage, StageTransition};

use crate::store::TransitionStore;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
struct Pending {
    from: Option<Stage>,
    to: Stage,
    observed_at: DateTime<Utc>,
    generation: u64,
}

#[derive(Default)]
struct Windows {
    /// Last stage observed per project, committed or not.
    previous: HashMap<String, Stage>,
    pending: HashMap<String, Pending>,
    next_generation: u64,
}

#[derive(Default)]
struct StoreSlot {
    store: Option<TransitionStore>,
    unavailable: bool,
}

struct Inner {
    db_path: PathBuf,
    debounce: Duration,
    cancel: CancellationToken,
    windows: Mutex<Windows>,
    /// Commit gate. Lock order is `store` before `windows`.
    store: Mutex<StoreSlot>,
    recorded: AtomicU64,
    dropped: AtomicU64,
    unavailable_warnings: AtomicU64,
}

#[derive(Clone)]
pub struct MetricsRecorder {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MetricsRecorder {
    /// The database at `db_path` is opened on first commit, not here.
    pub fn new(db_path: impl Into<PathBuf>, debounce: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                db_path: db_path.into(),
                debounce,
                cancel,
                windows: Mutex::new(Windows::default()),
                store: Mutex::new(StoreSlot::default()),
                recorded: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                unavailable_warnings: AtomicU64::new(0),
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Remember `stage` as the last observed stage without recording
    /// anything. Used at startup with persisted stages.
    pub fn seed(&self, project_id: &str, stage: Stage) {
        lock(&self.inner.windows)
            .previous
            .insert(project_id.to_string(), stage);
    }

    /// Drop everything known about `project_id`, including an open window.
    pub fn forget(&self, project_id: &str) {
        let mut windows = lock(&self.inner.windows);
        windows.previous.remove(project_id);
        windows.pending.remove(project_id);
    }

    /// Report the stage a detection produced.
    pub fn on_detection(&self, project_id: &str, stage: Stage) {
        self.observe(project_id, stage, Utc::now());
    }

    fn observe(&self, project_id: &str, stage: Stage, now: DateTime<Utc>) {
        let generation = {
            let mut windows = lock(&self.inner.windows);
            let previous = windows.previous.get(project_id).copied();
            if previous == Some(stage) {
                return;
            }
            windows.previous.insert(project_id.to_string(), stage);
            windows.next_generation += 1;
            let generation = windows.next_generation;
            windows
                .pending
                .entry(project_id.to_string())
                .and_modify(|p| {
                    p.to = stage;
                    p.observed_at = now;
                    p.generation = generation;
                })
                .or_insert(Pending {
                    from: previous,
                    to: stage,
                    observed_at: now,
                    generation,
                });
            generation
        };

        tracing::debug!(
            project = %project_id,
            stage = %stage,
            generation,
            "stage change observed"
        );

        if self.inner.cancel.is_cancelled() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // Outside a runtime the window stays open until flush().
            return;
        };

        let inner = Arc::clone(&self.inner);
        let id = project_id.to_string();
        handle.spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(inner.debounce) => {
                    let committer = Arc::clone(&inner);
                    let result = tokio::task::spawn_blocking(move || {
                        committer.commit_if_current(&id, generation);
                    })
                    .await;
                    if let Err(e) = result {
                        tracing::warn!("metrics commit task failed: {e}");
                    }
                }
            }
        });
    }

    /// Commit every open window now. Timers still running become no-ops.
    pub fn flush(&self) {
        let mut slot = lock(&self.inner.store);
        let mut drained: Vec<(String, Pending)> =
            lock(&self.inner.windows).pending.drain().collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        if !drained.is_empty() {
            tracing::debug!(windows = drained.len(), "flushing stage transitions");
        }
        for (id, pending) in drained {
            self.inner.write(&mut slot, &id, pending);
        }
    }

    /// Windows still waiting for their debounce period to elapse.
    pub fn pending(&self) -> usize {
        lock(&self.inner.windows).pending.len()
    }

    pub fn recorded(&self) -> u64 {
        self.inner.recorded.load(Ordering::Relaxed)
    }

    /// Transitions lost to write failures.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Times the "metrics store unavailable" warning was logged: at most once.
    pub fn unavailable_warnings(&self) -> u64 {
        self.inner.unavailable_warnings.load(Ordering::Relaxed)
    }
}

impl Inner {
    fn commit_if_current(&self, project_id: &str, generation: u64) {
        let mut slot = lock(&self.store);
        let pending = {
            let mut windows = lock(&self.windows);
            match windows.pending.get(project_id) {
                Some(p) if p.generation == generation => windows.pending.remove(project_id),
                _ => None,
            }
        };
        if let Some(pending) = pending {
            self.write(&mut slot, project_id, pending);
        }
    }

    fn write(&self, slot: &mut StoreSlot, project_id: &str, pending: Pending) {
        if pending.from == Some(pending.to) {
            tracing::debug!(project = %project_id, "stage returned to its start, nothing to record");
            return;
        }

        if slot.store.is_none() && !slot.unavailable {
            match TransitionStore::open(&self.db_path) {
                Ok(store) => slot.store = Some(store),
                Err(e) => {
                    tracing::warn!(
                        path = %self.db_path.display(),
                        "metrics store unavailable, stage transitions will not be recorded: {e}"
                    );
                    slot.unavailable = true;
                    self.unavailable_warnings.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        let Some(store) = slot.store.as_ref() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let transition =
            StageTransition::new(project_id, pending.from, pending.to, pending.observed_at);
        match store.insert(&transition) {
            Ok(()) => {
                self.recorded.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    project = %project_id,
                    from = %transition.from_stage_str(),
                    to = %transition.to_stage,
                    "stage transition recorded"
                );
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(project = %project_id, "failed to record stage transition: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(dir: &tempfile::TempDir) -> (MetricsRecorder, PathBuf) {
        let path = dir.path().join("metrics.db");
        let rec = MetricsRecorder::new(&path, Duration::from_secs(10), CancellationToken::new());
        (rec, path)
    }

    fn rows(path: &std::path::Path, id: &str) -> Vec<StageTransition> {
        TransitionStore::open(path)
            .expect("open")
            .transitions_for(id)
            .expect("query")
    }

    #[test]
    fn same_stage_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (rec, path) = recorder(&dir);
        rec.seed("p", Stage::Plan);
        rec.on_detection("p", Stage::Plan);
        assert_eq!(rec.pending(), 0);
        rec.flush();
        assert!(!path.exists());
    }

    #[test]
    fn flush_commits_open_windows_without_a_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (rec, path) = recorder(&dir);
        rec.on_detection("p", Stage::Plan);
        rec.on_detection("p", Stage::Tasks);
        rec.on_detection("q", Stage::Specify);
        assert_eq!(rec.pending(), 2);

        rec.flush();
        assert_eq!(rec.pending(), 0);
        let p = rows(&path, "p");
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].from_stage, None);
        assert_eq!(p[0].to_stage, Stage::Tasks);
        assert_eq!(rows(&path, "q").len(), 1);
        assert_eq!(rec.recorded(), 2);
    }

    #[test]
    fn window_returning_to_its_start_records_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (rec, path) = recorder(&dir);
        rec.seed("p", Stage::Plan);
        rec.on_detection("p", Stage::Tasks);
        rec.on_detection("p", Stage::Plan);
        rec.flush();
        assert_eq!(rec.recorded(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn seeded_stage_becomes_from_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (rec, path) = recorder(&dir);
        rec.seed("p", Stage::Specify);
        rec.on_detection("p", Stage::Plan);
        rec.flush();
        let got = rows(&path, "p");
        assert_eq!(got[0].from_stage, Some(Stage::Specify));
        assert_eq!(got[0].to_stage, Stage::Plan);
    }

    #[test]
    fn forget_discards_open_window() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (rec, path) = recorder(&dir);
        rec.on_detection("p", Stage::Plan);
        rec.forget("p");
        rec.flush();
        assert!(!path.exists());

        // After forgetting, the next observation is a first record again.
        rec.on_detection("p", Stage::Tasks);
        rec.flush();
        assert_eq!(rows(&path, "p")[0].from_stage, None);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_commits_after_quiet_period() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (rec, path) = recorder(&dir);
        rec.on_detection("p", Stage::Plan);
        tokio::time::sleep(Duration::from_secs(5)).await;
        rec.on_detection("p", Stage::Tasks);

        // The first timer fires at 10s but its generation is stale.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(rec.pending(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        for _ in 0..200 {
            if rec.recorded() == 1 {
                break;
            }
            tokio::task::yield_now().await;
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(rec.pending(), 0);
        assert_eq!(rec.recorded(), 1);
        let got = rows(&path, "p");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].to_stage, Stage::Tasks);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_timers_but_flush_still_commits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cancel = CancellationToken::new();
        let path = dir.path().join("metrics.db");
        let rec = MetricsRecorder::new(&path, Duration::from_secs(10), cancel.clone());

        rec.on_detection("p", Stage::Plan);
        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rec.pending(), 1);

        rec.flush();
        assert_eq!(rows(&path, "p").len(), 1);
    }
}

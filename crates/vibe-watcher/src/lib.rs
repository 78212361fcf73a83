//! vibe-watcher: debounced filesystem events for tracked projects.
//!
//! `notify` callbacks run on the backend's own thread; they are bridged into
//! a tokio channel and consumed by a single debounce task. The task keeps
//! the latest event per path and flushes everything once no raw event has
//! arrived for the debounce window.

mod translate;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use vibe_core::{FileEvent, VibeError};

pub use translate::translate;

/// Capacity of the outgoing event stream.
pub const EVENT_BUFFER: usize = 100;
/// Capacity of the raw bridge from the notify thread.
const RAW_BUFFER: usize = 256;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

// ─── Shared state ─────────────────────────────────────────────────

/// Everything the debounce task and the public API both touch.
#[derive(Default)]
struct DebounceState {
    /// Latest event per path, in first-seen order.
    pending: Vec<FileEvent>,
    index: HashMap<PathBuf, usize>,
    out: Option<mpsc::Sender<FileEvent>>,
    closed: bool,
    failed: Vec<PathBuf>,
}

impl DebounceState {
    fn push(&mut self, event: FileEvent) {
        match self.index.get(&event.path) {
            Some(&i) => self.pending[i] = event,
            None => {
                self.index.insert(event.path.clone(), self.pending.len());
                self.pending.push(event);
            }
        }
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.index.clear();
    }

    fn drop_pending_under(&mut self, root: &Path) {
        let kept: Vec<FileEvent> = self
            .pending
            .drain(..)
            .filter(|e| !e.path.starts_with(root))
            .collect();
        self.clear_pending();
        for event in kept {
            self.push(event);
        }
    }

    fn flush(&mut self) {
        let events = std::mem::take(&mut self.pending);
        self.index.clear();
        let Some(out) = self.out.as_ref() else {
            return;
        };
        let mut dropped = 0usize;
        for event in events {
            match out.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    dropped += 1;
                    tracing::debug!(path = %event.path.display(), "watcher buffer full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("watcher stream receiver dropped");
                    self.out = None;
                    return;
                }
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, "watcher stream full, events dropped");
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.clear_pending();
        self.out = None;
    }
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── FileWatcher ──────────────────────────────────────────────────

pub struct FileWatcher {
    debounce: Duration,
    cancel: CancellationToken,
    state: Arc<Mutex<DebounceState>>,
    backend: Mutex<Option<RecommendedWatcher>>,
}

impl FileWatcher {
    /// The watcher stops when `cancel` fires or on [`FileWatcher::close`].
    pub fn new(debounce: Duration, cancel: CancellationToken) -> Self {
        Self {
            debounce,
            cancel: cancel.child_token(),
            state: Arc::new(Mutex::new(DebounceState::default())),
            backend: Mutex::new(None),
        }
    }

    /// Start watching `paths` recursively and return the debounced stream.
    ///
    /// Paths that fail to register are recorded in
    /// [`FileWatcher::failed_paths`]; the call fails only when every given
    /// path failed. Must be called from within a tokio runtime.
    pub fn watch(&self, paths: &[PathBuf]) -> Result<mpsc::Receiver<FileEvent>, VibeError> {
        if lock(&self.state).closed {
            return Err(VibeError::Watch("watcher is closed".to_string()));
        }
        let mut backend_slot = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        if backend_slot.is_some() {
            return Err(VibeError::Watch("watcher already started".to_string()));
        }

        let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>(RAW_BUFFER);
        let mut backend = notify::recommended_watcher(move |res| {
            // Receiver gone means the watcher is shutting down.
            let _ = raw_tx.blocking_send(res);
        })
        .map_err(|e| VibeError::Watch(format!("create watcher: {e}")))?;

        let mut failed = Vec::new();
        for path in paths {
            match backend.watch(path, RecursiveMode::Recursive) {
                Ok(()) => tracing::debug!(path = %path.display(), "watching"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to watch path: {e}");
                    failed.push(path.clone());
                }
            }
        }
        if !paths.is_empty() && failed.len() == paths.len() {
            return Err(VibeError::Watch(format!(
                "none of {} paths could be watched",
                paths.len()
            )));
        }

        lock(&self.state).failed = failed;
        *backend_slot = Some(backend);
        drop(backend_slot);

        Ok(self.start_debouncer(raw_rx))
    }

    /// Spawn the debounce task over a raw event channel.
    fn start_debouncer(
        &self,
        raw_rx: mpsc::Receiver<notify::Result<Event>>,
    ) -> mpsc::Receiver<FileEvent> {
        let (out_tx, out_rx) = mpsc::channel(EVENT_BUFFER);
        lock(&self.state).out = Some(out_tx);
        tokio::spawn(run_debouncer(
            raw_rx,
            Arc::clone(&self.state),
            self.debounce,
            self.cancel.clone(),
        ));
        out_rx
    }

    /// Watch an additional path while running.
    pub fn add_path(&self, path: &Path) -> Result<(), VibeError> {
        let mut slot = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(backend) = slot.as_mut() else {
            return Err(VibeError::Watch("watcher is not running".to_string()));
        };
        match backend.watch(path, RecursiveMode::Recursive) {
            Ok(()) => {
                lock(&self.state).failed.retain(|p| p != path);
                tracing::debug!(path = %path.display(), "watching");
                Ok(())
            }
            Err(e) => {
                let mut state = lock(&self.state);
                if !state.failed.iter().any(|p| p == path) {
                    state.failed.push(path.to_path_buf());
                }
                Err(VibeError::Watch(format!("{}: {e}", path.display())))
            }
        }
    }

    /// Stop watching `path` and discard its pending events.
    pub fn remove_path(&self, path: &Path) {
        let mut slot = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(backend) = slot.as_mut() {
            if let Err(e) = backend.unwatch(path) {
                tracing::debug!(path = %path.display(), "unwatch failed: {e}");
            }
        }
        drop(slot);
        let mut state = lock(&self.state);
        state.drop_pending_under(path);
        state.failed.retain(|p| p != path);
    }

    /// Paths that could not be watched.
    pub fn failed_paths(&self) -> Vec<PathBuf> {
        lock(&self.state).failed.clone()
    }

    /// Tear down. Pending events are discarded and the stream ends.
    /// Safe to call more than once.
    pub fn close(&self) {
        {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            state.close();
        }
        self.cancel.cancel();
        let backend = self
            .backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(backend);
        tracing::debug!("file watcher closed");
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Debounce loop ────────────────────────────────────────────────

async fn run_debouncer(
    mut raw_rx: mpsc::Receiver<notify::Result<Event>>,
    state: Arc<Mutex<DebounceState>>,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let fire_at = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = cancel.cancelled() => break,
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                match raw {
                    Ok(event) => {
                        let translated = translate(&event.kind, &event.paths, Utc::now());
                        if translated.is_empty() {
                            continue;
                        }
                        let mut guard = lock(&state);
                        if guard.closed {
                            break;
                        }
                        for e in translated {
                            tracing::debug!(path = %e.path.display(), op = %e.operation, "raw file event");
                            guard.push(e);
                        }
                        drop(guard);
                        deadline = Some(Instant::now() + window);
                    }
                    Err(e) => tracing::warn!("watcher backend error: {e}"),
                }
            }
            _ = sleep_until(fire_at), if deadline.is_some() => {
                deadline = None;
                let mut guard = lock(&state);
                if guard.closed {
                    break;
                }
                tracing::debug!(events = guard.pending.len(), "flushing debounced events");
                guard.flush();
            }
        }
    }

    // Ends the stream without emitting what is still pending.
    lock(&state).close();
    tracing::debug!("watcher debounce loop stopped");
}

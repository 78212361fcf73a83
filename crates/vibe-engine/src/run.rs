//! Watch mode: file events in, periodic hibernation sweeps, orderly
//! shutdown on cancellation.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use vibe_core::{FileEvent, VibeError};

use crate::engine::StateEngine;

impl StateEngine {
    /// Watch every tracked project until the root cancellation fires or
    /// the event stream ends, then shut down.
    pub async fn run(&self) -> Result<(), VibeError> {
        let paths = self.tracked_paths();
        let events = self.inner.watcher.watch(&paths)?;
        self.inner.watching.store(true, Ordering::SeqCst);

        let failed = self.inner.watcher.failed_paths();
        tracing::info!(
            projects = paths.len(),
            unwatched = failed.len(),
            "engine started"
        );

        self.run_with(events).await;
        self.shutdown().await;
        Ok(())
    }

    /// Drive the engine from an arbitrary event stream. Returns when the
    /// root cancellation fires or the stream ends.
    pub async fn run_with(&self, mut events: mpsc::Receiver<FileEvent>) {
        let mut sweep = tokio::time::interval(self.inner.settings.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => {
                    tracing::info!("cancellation requested, stopping watch loop");
                    break;
                }
                _ = sweep.tick() => {
                    let hibernated = self.sweep_for_hibernation(Utc::now()).await;
                    if !hibernated.is_empty() {
                        tracing::debug!(count = hibernated.len(), "sweep hibernated projects");
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("file event stream closed");
                        break;
                    };
                    if let Err(e) = self.on_file_event(event).await {
                        tracing::warn!(error = %e, "failed to apply file event");
                    }
                }
            }
        }
    }

    /// Close the watcher, wait for in-flight re-detections, flush the
    /// metrics recorder. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.inner.watching.store(false, Ordering::SeqCst);
        self.inner.watcher.close();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;

        let inner = Arc::clone(&self.inner);
        if let Err(e) = tokio::task::spawn_blocking(move || inner.recorder.flush()).await {
            tracing::warn!(error = %e, "metrics flush task failed");
        }
        tracing::info!("engine stopped");
    }
}

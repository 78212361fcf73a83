//! vibe-engine: the project state engine.
//!
//! Composes storage, detection, the file watcher, and the metrics recorder
//! into one process-scoped [`StateEngine`]. The CLI and any other front end
//! talk only to this crate.

pub mod engine;
mod run;
pub mod snapshot;

pub use engine::{FavoriteAction, RefreshSummary, StateEngine};
pub use snapshot::ProjectSnapshot;

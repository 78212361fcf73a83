//! Stage-transition metrics: a SQLite log fed by a debounced recorder.

pub mod recorder;
pub mod store;

pub use recorder::{DEFAULT_DEBOUNCE, MetricsRecorder};
pub use store::TransitionStore;

//! Raw `notify` events to coarse [`FileEvent`]s.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use vibe_core::{FileEvent, FileOperation};

/// Translate one raw event. Permission-only and access events are dropped.
///
/// A rename is a `delete` of the old path; when the backend reports the
/// new path too it becomes a `create` there.
pub fn translate(kind: &EventKind, paths: &[PathBuf], at: DateTime<Utc>) -> Vec<FileEvent> {
    let each = |op: FileOperation| -> Vec<FileEvent> {
        paths
            .iter()
            .map(|p| FileEvent::new(p.clone(), op, at))
            .collect()
    };

    match kind {
        EventKind::Create(_) => each(FileOperation::Create),
        EventKind::Remove(_) => each(FileOperation::Delete),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(FileOperation::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::with_capacity(paths.len());
            if let Some(from) = paths.first() {
                events.push(FileEvent::new(from.clone(), FileOperation::Delete, at));
            }
            for to in paths.iter().skip(1) {
                events.push(FileEvent::new(to.clone(), FileOperation::Create, at));
            }
            events
        }
        EventKind::Modify(ModifyKind::Name(_)) => each(FileOperation::Delete),
        EventKind::Modify(_) => each(FileOperation::Modify),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

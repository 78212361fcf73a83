//! Human-legible directory names for allocated project directories.
//!
//! A canonical path yields one candidate name per depth: depth `d` joins the
//! last `d + 1` path segments (leaf last) and normalizes the result.

use std::path::{Component, Path};

/// Maximum number of depths tried before allocation gives up.
pub const MAX_COLLISION_DEPTH: usize = 10;

/// Lowercase, map anything outside `[a-z0-9-]` to `-`, collapse runs of
/// `-`, and trim `-` from both ends.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = false;
    for c in raw.chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if mapped == '-' {
            if last_dash {
                continue;
            }
            last_dash = true;
        } else {
            last_dash = false;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// Normal path segments ordered root to leaf.
pub fn segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Candidate name at `depth`.
///
/// Returns `None` when the path has fewer than `depth + 1` segments, and
/// `Some("")` when the segments normalize to nothing (caller skips ahead).
pub fn candidate(path: &Path, depth: usize) -> Option<String> {
    let segs = segments(path);
    if depth >= segs.len() {
        return None;
    }
    let tail = &segs[segs.len() - depth - 1..];
    Some(normalize(&tail.join("-")))
}

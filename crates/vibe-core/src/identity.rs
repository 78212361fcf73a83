//! Project identity derived from the canonical path.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
pub const PROJECT_ID_LEN: usize = 16;

/// Stable project id: the first 16 lowercase hex chars of
/// `sha256(canonical_path)`.
pub fn project_id(canonical_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_path.to_string_lossy().as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(PROJECT_ID_LEN);
    id
}

/// Final path segment, or `"root"` for the filesystem root.
pub fn project_name(canonical_path: &Path) -> String {
    match canonical_path.file_name() {
        Some(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        _ => "root".to_string(),
    }
}

/// True when `value` looks like a project id (16 lowercase hex chars).
pub fn is_project_id(value: &str) -> bool {
    value.len() == PROJECT_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

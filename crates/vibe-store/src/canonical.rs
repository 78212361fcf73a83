//! Path canonicalization: the single identity key for a project.

use std::fs;
use std::path::{Path, PathBuf};

use vibe_core::VibeError;

/// Canonical physical path for a user-supplied path.
///
/// Expands a leading `~` (`~foo` is read as `~/foo`), makes the path
/// absolute against the current directory, and resolves every symlink.
/// The target must exist.
pub fn canonicalize(input: &str) -> Result<PathBuf, VibeError> {
    let home = dirs::home_dir();
    canonicalize_with_home(input, home.as_deref())
}

pub fn canonicalize_with_home(input: &str, home: Option<&Path>) -> Result<PathBuf, VibeError> {
    if input.trim().is_empty() {
        return Err(VibeError::path_not_accessible(input, "empty path"));
    }

    let expanded = expand_tilde(input, home)?;
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map_err(|e| VibeError::path_not_accessible(input, e))?
            .join(expanded)
    };

    fs::canonicalize(&absolute).map_err(|e| VibeError::path_not_accessible(input, e))
}

fn expand_tilde(input: &str, home: Option<&Path>) -> Result<PathBuf, VibeError> {
    let Some(rest) = input.strip_prefix('~') else {
        return Ok(PathBuf::from(input));
    };
    let home =
        home.ok_or_else(|| VibeError::path_not_accessible(input, "home directory is unknown"))?;
    let rest = rest.trim_start_matches('/');
    Ok(if rest.is_empty() {
        home.to_path_buf()
    } else {
        home.join(rest)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_rejected() {
        for input in ["", "   "] {
            assert!(matches!(
                canonicalize(input),
                Err(VibeError::PathNotAccessible { .. })
            ));
        }
    }

    #[test]
    fn missing_target_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = canonicalize(&missing.to_string_lossy()).expect_err("missing");
        assert!(matches!(err, VibeError::PathNotAccessible { .. }));
    }

    #[test]
    fn tilde_forms_expand_under_home() {
        let home = tempfile::tempdir().expect("tempdir");
        fs::create_dir(home.path().join("foo")).expect("mkdir");
        let real_home = fs::canonicalize(home.path()).expect("canonical home");

        assert_eq!(
            canonicalize_with_home("~", Some(home.path())).expect("~"),
            real_home
        );
        assert_eq!(
            canonicalize_with_home("~/foo", Some(home.path())).expect("~/foo"),
            real_home.join("foo")
        );
        assert_eq!(
            canonicalize_with_home("~foo", Some(home.path())).expect("~foo"),
            real_home.join("foo")
        );
        assert!(canonicalize_with_home("~/foo", None).is_err());
    }

    #[test]
    fn dot_segments_are_resolved() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("a")).expect("mkdir");
        let messy = dir.path().join("a").join("..").join("a").join(".");
        let canonical = canonicalize(&messy.to_string_lossy()).expect("canonical");
        assert_eq!(
            canonical,
            fs::canonicalize(dir.path().join("a")).expect("canonical")
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_and_target_share_identity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("real");
        fs::create_dir(&target).expect("mkdir");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).expect("symlink");

        let via_link = canonicalize(&link.to_string_lossy()).expect("link");
        let direct = canonicalize(&target.to_string_lossy()).expect("target");
        assert_eq!(via_link, direct);
        assert_eq!(
            via_link.as_os_str().as_encoded_bytes(),
            direct.as_os_str().as_encoded_bytes()
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).expect("symlink");
        assert!(canonicalize(&link.to_string_lossy()).is_err());
    }
}

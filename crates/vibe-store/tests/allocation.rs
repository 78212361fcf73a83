use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use vibe_core::VibeError;
use vibe_store::allocator::read_marker;
use vibe_store::{DirectoryAllocator, canonicalize};

fn make_dir(base: &Path, rel: &str) -> PathBuf {
    let dir = base.join(rel);
    fs::create_dir_all(&dir).expect("mkdir");
    canonicalize(&dir.to_string_lossy()).expect("canonical")
}

#[test]
fn three_peers_named_api() {
    let projects = tempfile::tempdir().expect("tempdir");
    let root = tempfile::tempdir().expect("tempdir");
    let alloc = DirectoryAllocator::open(root.path()).expect("open");

    let paths: Vec<PathBuf> = ["workspace-a/api", "workspace-b/api", "workspace-c/api"]
        .iter()
        .map(|rel| make_dir(projects.path(), rel))
        .collect();
    let names: Vec<String> = paths
        .iter()
        .map(|p| alloc.allocate(p).expect("allocate"))
        .collect();

    assert_eq!(names, vec!["api", "workspace-b-api", "workspace-c-api"]);
    for (path, name) in paths.iter().zip(&names) {
        let marker = read_marker(&root.path().join(name)).expect("marker");
        assert_eq!(marker.as_ref(), Some(path));
    }
}

#[test]
fn collision_depth_is_bounded_at_ten() {
    let root = tempfile::tempdir().expect("tempdir");
    let alloc = DirectoryAllocator::open(root.path()).expect("open");

    // Project k lives at /base/p<k>/a/.../a/api with k `a` segments, so it
    // collides with every earlier project until depth k.
    let path_for = |k: usize| {
        let mut path = PathBuf::from(format!("/base/p{k}"));
        for _ in 0..k {
            path.push("a");
        }
        path.push("api");
        path
    };

    let mut names = HashSet::new();
    for k in 0..10 {
        let name = alloc.allocate(&path_for(k)).expect("within bound");
        assert!(names.insert(name), "names must be distinct");
    }

    let err = alloc.allocate(&path_for(10)).expect_err("11th must fail");
    assert!(matches!(
        err,
        VibeError::CollisionUnresolvable { depth: 10, .. }
    ));
}

#[test]
fn determinism_across_reopen_and_order() {
    let root_a = tempfile::tempdir().expect("tempdir");
    let root_b = tempfile::tempdir().expect("tempdir");
    let paths = [
        PathBuf::from("/x/one/app"),
        PathBuf::from("/x/two/app"),
        PathBuf::from("/x/app"),
    ];

    let first = DirectoryAllocator::open(root_a.path()).expect("open");
    let names: Vec<String> = paths
        .iter()
        .map(|p| first.allocate(p).expect("allocate"))
        .collect();
    drop(first);

    let reopened = DirectoryAllocator::open(root_a.path()).expect("reopen");
    for (path, name) in paths.iter().zip(&names) {
        assert_eq!(&reopened.allocate(path).expect("again"), name);
    }

    // A fresh store allocating in reverse order still yields distinct names.
    let other = DirectoryAllocator::open(root_b.path()).expect("open");
    let reversed: HashSet<String> = paths
        .iter()
        .rev()
        .map(|p| other.allocate(p).expect("allocate"))
        .collect();
    assert_eq!(reversed.len(), paths.len());
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof!["[a-z]{1,4}", "[A-Z_ ]{1,3}", Just("api".to_string())]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn allocation_is_distinct_and_stable(
        paths in proptest::collection::hash_set(
            proptest::collection::vec(segment(), 1..4),
            1..8,
        )
    ) {
        let root = tempfile::tempdir().expect("tempdir");
        let alloc = DirectoryAllocator::open(root.path()).expect("open");

        let mut seen = HashSet::new();
        for segs in &paths {
            let mut path = PathBuf::from("/p");
            for s in segs {
                path.push(s);
            }
            match alloc.allocate(&path) {
                Ok(name) => {
                    prop_assert_eq!(alloc.allocate(&path).expect("idempotent"), name.clone());
                    prop_assert_eq!(
                        read_marker(&root.path().join(&name)).expect("marker"),
                        Some(path.clone())
                    );
                    prop_assert!(seen.insert(name));
                }
                Err(VibeError::CollisionUnresolvable { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {e}"),
            }
        }
    }
}

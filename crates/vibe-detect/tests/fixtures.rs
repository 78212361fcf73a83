use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use vibe_core::{Confidence, Method, Stage};
use vibe_detect::DetectorRegistry;

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    #[allow(dead_code)]
    description: String,
    files: BTreeMap<String, String>,
    expected: Expected,
}

#[derive(Debug, Deserialize)]
struct Expected {
    method: Method,
    stage: Stage,
    confidence: Confidence,
    reasoning: String,
}

fn fixtures_dir() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../fixtures/detect")
}

fn load_fixtures(dir: &Path) -> Vec<Fixture> {
    let mut fixtures = Vec::new();
    for entry in fs::read_dir(dir).expect("fixtures dir") {
        let path = entry.expect("entry").path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {:?}: {}", path, e));
        let fixture: Fixture = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("failed to parse fixture {:?}: {}", path, e));
        fixtures.push(fixture);
    }
    fixtures.sort_by(|a, b| a.name.cmp(&b.name));
    fixtures
}

fn materialize(root: &Path, files: &BTreeMap<String, String>) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, contents).expect("write fixture file");
    }
}

#[test]
fn test_all_detection_fixtures() {
    let fixtures = load_fixtures(&fixtures_dir());
    assert!(
        !fixtures.is_empty(),
        "no fixtures found in {:?}",
        fixtures_dir()
    );

    let registry = DetectorRegistry::with_builtin();
    let cancel = CancellationToken::new();
    let mut failures = Vec::new();

    for fixture in &fixtures {
        let dir = tempfile::tempdir().expect("tempdir");
        materialize(dir.path(), &fixture.files);
        let c = registry.classify(dir.path(), &cancel).expect("classify");

        let actual = (c.method, c.stage, c.confidence, c.reasoning.as_str());
        let expected = (
            fixture.expected.method,
            fixture.expected.stage,
            fixture.expected.confidence,
            fixture.expected.reasoning.as_str(),
        );
        if actual != expected {
            failures.push(format!(
                "{}: expected {:?}, got {:?}",
                fixture.name, expected, actual
            ));
        }
    }

    assert!(failures.is_empty(), "fixture failures:\n{}", failures.join("\n"));
}

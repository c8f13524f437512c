//! End-to-end release cycles against a real directory tree.

use super::test_utils::{at, TestWorkspace};
use relwatch::aggregator::AggregatorState;
use relwatch::engine::CycleOutcome;
use relwatch::freeze::FreezeWindowConfig;

#[test]
fn test_added_file_releases_next_patch_after_cooldown() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.2.3");
    ws.write("src/app.ts", "export {}");
    let mut engine = ws.engine(&ws.config(), 5);

    ws.write("src/feature.ts", "export const feature = 1;");
    let first = engine.step(at(0)).unwrap();
    assert!(matches!(first, CycleOutcome::Accumulating { .. }));
    assert_eq!(ws.version(), "1.2.3");

    let second = engine.step(at(5)).unwrap();
    assert_eq!(second.to_string(), "released: version 1.2.4");
    assert_eq!(ws.version(), "1.2.4");

    let log = ws.log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["version"], "1.2.4");
    assert_eq!(log[0]["counts"]["added"], 1);
    assert_eq!(log[0]["_files"][0], "added: src/feature.ts");
    assert!(engine.pending().is_empty());
}

#[test]
fn test_freeze_window_holds_release_until_it_ends() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.2.3");
    let mut config = ws.config();
    config.freeze.windows.push(FreezeWindowConfig {
        start: "2024-06-01T00:00:00Z".to_string(),
        end: "2024-06-01T12:01:00Z".to_string(),
    });
    let mut engine = ws.engine(&config, 5);

    ws.write("docs/guide.md", "# Guide");
    engine.step(at(0)).unwrap();
    for secs in [10, 20, 30] {
        let outcome = engine.step(at(secs)).unwrap();
        assert_eq!(outcome.to_string(), "deferred: in freeze window");
        assert_eq!(engine.pending().len(), 1);
        assert_eq!(engine.aggregator_state(), AggregatorState::Accumulating);
    }
    assert_eq!(ws.version(), "1.2.3");
    assert!(ws.log().is_empty());

    let after = engine.step(at(61)).unwrap();
    assert_eq!(after.to_string(), "released: version 1.2.4");
}

#[test]
fn test_override_releases_inside_freeze() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.2.3");
    let mut config = ws.config();
    config.freeze.windows.push(FreezeWindowConfig {
        start: "2024-06-01T00:00:00Z".to_string(),
        end: "2024-06-02T00:00:00Z".to_string(),
    });
    config.freeze.override_release = true;
    let mut engine = ws.engine(&config, 5);

    ws.write("a.txt", "a");
    engine.step(at(0)).unwrap();
    assert!(engine.step(at(5)).unwrap().is_release());
    assert_eq!(ws.version(), "1.2.4");
}

#[test]
fn test_edits_during_cooldown_produce_one_release() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.2.3");
    let mut engine = ws.engine(&ws.config(), 5);

    ws.write("a.txt", "first");
    engine.step(at(0)).unwrap();
    ws.write("a.txt", "second");
    assert!(matches!(
        engine.step(at(1)).unwrap(),
        CycleOutcome::Accumulating { .. }
    ));
    assert!(matches!(
        engine.step(at(5)).unwrap(),
        CycleOutcome::Accumulating {
            remaining_secs: 1,
            ..
        }
    ));

    let released = engine.step(at(6)).unwrap();
    assert_eq!(released.to_string(), "released: version 1.2.4");
    assert_eq!(engine.step(at(12)).unwrap(), CycleOutcome::NoChanges);
    assert_eq!(ws.log().len(), 1);
    assert_eq!(ws.log()[0]["_files"][0], "added: a.txt");
}

#[test]
fn test_self_artifacts_never_create_changes() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.2.3");
    let mut engine = ws.engine(&ws.config(), 5);

    ws.write("version.json", "{\"version\": \"1.2.3\", \"note\": \"edited\"}");
    ws.write("release-log.json", "[]");
    ws.write(".relwatch/scratch.txt", "x");
    ws.write("src/app.ts.relwatch-tmp", "partial");

    assert_eq!(engine.step(at(0)).unwrap(), CycleOutcome::NoChanges);
    assert!(engine.pending().is_empty());
    assert_eq!(engine.step(at(10)).unwrap(), CycleOutcome::NoChanges);
}

#[test]
fn test_add_then_remove_before_flush_cancels() {
    let ws = TestWorkspace::new();
    let mut engine = ws.engine(&ws.config(), 5);

    ws.write("scratch.txt", "tmp");
    engine.step(at(0)).unwrap();
    ws.remove("scratch.txt");
    assert_eq!(engine.step(at(1)).unwrap(), CycleOutcome::NoChanges);
    assert_eq!(engine.step(at(10)).unwrap(), CycleOutcome::NoChanges);
    assert!(ws.log().is_empty());
}

#[test]
fn test_removed_file_is_released() {
    let ws = TestWorkspace::new();
    ws.write("old.txt", "bye");
    let mut engine = ws.engine(&ws.config(), 0);

    ws.remove("old.txt");
    let outcome = engine.step(at(0)).unwrap();
    assert_eq!(outcome.to_string(), "released: version 0.0.1");
    assert_eq!(ws.log()[0]["_files"][0], "removed: old.txt");
    assert_eq!(ws.log()[0]["counts"]["removed"], 1);
}

#[test]
fn test_ignored_paths_do_not_trigger() {
    let ws = TestWorkspace::new();
    ws.write(".relwatchignore", "# generated output\ngenerated/\n*.bak\n");
    let mut engine = ws.engine(&ws.config(), 0);

    ws.write("node_modules/dep/index.js", "x");
    ws.write(".git/HEAD", "ref");
    ws.write("build.log", "noise");
    ws.write("generated/out.js", "x");
    ws.write("notes.bak", "x");
    assert_eq!(engine.step(at(0)).unwrap(), CycleOutcome::NoChanges);

    ws.write("src/index.js", "x");
    assert!(engine.step(at(1)).unwrap().is_release());
}

#[test]
fn test_manifests_follow_release_without_retriggering() {
    let ws = TestWorkspace::new();
    ws.seed_version("2.0.0");
    ws.write("package.json", "{\"name\": \"app\", \"version\": \"2.0.0\"}");
    ws.write("modules/core/module.manifest.json", "{\"version\": \"2.0.0\"}");
    let mut config = ws.config();
    config.release.manifests = vec![
        "package.json".to_string(),
        "**/module.manifest.json".to_string(),
    ];
    let mut engine = ws.engine(&config, 0);

    ws.write("modules/core/index.ts", "export {}");
    match engine.step(at(0)).unwrap() {
        CycleOutcome::Released { version, manifests, .. } => {
            assert_eq!(version, "2.0.1");
            assert_eq!(
                manifests,
                vec!["modules/core/module.manifest.json", "package.json"]
            );
        }
        other => panic!("expected a release, got {:?}", other),
    }
    assert_eq!(ws.read_json("package.json")["version"], "2.0.1");
    assert_eq!(ws.read_json("package.json")["name"], "app");
    assert_eq!(engine.step(at(1)).unwrap(), CycleOutcome::NoChanges);
}

#[test]
fn test_releases_are_monotonic_and_newest_first() {
    let ws = TestWorkspace::new();
    ws.seed_version("0.9.9");
    let mut engine = ws.engine(&ws.config(), 0);

    for (i, name) in ["a.txt", "b.txt", "c.txt"].iter().enumerate() {
        ws.write(name, "x");
        assert!(engine.step(at(i as i64)).unwrap().is_release());
    }
    let versions: Vec<String> = ws
        .log()
        .iter()
        .map(|e| e["version"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(versions, vec!["0.9.12", "0.9.11", "0.9.10"]);
    assert_eq!(ws.version(), "0.9.12");
}

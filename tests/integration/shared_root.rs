//! A watcher and one-shot runs sharing one watch root.

use super::test_utils::{at, TestWorkspace};
use relwatch::changeset::ChangeKind;
use relwatch::engine::{CycleOutcome, ReleaseEngine};
use relwatch::release::Version;
use relwatch::state::WatchState;
use relwatch::types::ReleaseSource;
use std::time::Duration;

fn oneshot(ws: &TestWorkspace) -> ReleaseEngine {
    ReleaseEngine::open(ws.root(), &ws.config(), ReleaseSource::Oneshot, Duration::ZERO).unwrap()
}

fn logged_files(ws: &TestWorkspace) -> Vec<Vec<String>> {
    ws.log()
        .iter()
        .map(|entry| {
            entry["_files"]
                .as_array()
                .unwrap()
                .iter()
                .map(|f| f.as_str().unwrap().to_string())
                .collect()
        })
        .collect()
}

#[test]
fn test_oneshot_release_is_not_repeated_by_watcher() {
    let ws = TestWorkspace::new();
    let mut watcher = ws.engine(&ws.config(), 5);
    ws.write("a.txt", "a");
    assert!(matches!(
        watcher.step(at(0)).unwrap(),
        CycleOutcome::Accumulating { .. }
    ));

    let mut once = oneshot(&ws);
    assert_eq!(
        once.step(at(1)).unwrap().to_string(),
        "released: version 0.0.1"
    );

    let outcome = watcher.step(at(6)).unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Duplicate {
            version: "0.0.1".to_string()
        }
    );
    assert!(watcher.pending().is_empty());
    assert_eq!(logged_files(&ws), vec![vec!["added: a.txt".to_string()]]);
    assert_eq!(ws.version(), "0.0.1");

    assert_eq!(watcher.step(at(20)).unwrap(), CycleOutcome::NoChanges);
    assert_eq!(ws.log().len(), 1);
}

#[test]
fn test_watcher_keeps_only_changes_the_oneshot_missed() {
    let ws = TestWorkspace::new();
    let mut watcher = ws.engine(&ws.config(), 5);
    ws.write("a.txt", "a");
    watcher.step(at(0)).unwrap();

    let mut once = oneshot(&ws);
    assert!(once.step(at(1)).unwrap().is_release());

    ws.write("b.txt", "b");
    assert!(matches!(
        watcher.step(at(6)).unwrap(),
        CycleOutcome::Accumulating { .. }
    ));
    assert_eq!(watcher.pending().kind_of("b.txt"), Some(ChangeKind::Added));
    assert_eq!(watcher.pending().kind_of("a.txt"), None);

    assert_eq!(
        watcher.step(at(11)).unwrap().to_string(),
        "released: version 0.0.2"
    );
    assert_eq!(
        logged_files(&ws),
        vec![
            vec!["added: b.txt".to_string()],
            vec!["added: a.txt".to_string()]
        ]
    );
}

#[test]
fn test_watcher_release_seen_by_later_oneshot() {
    let ws = TestWorkspace::new();
    let mut watcher = ws.engine(&ws.config(), 0);
    ws.write("a.txt", "a");
    assert!(watcher.step(at(0)).unwrap().is_release());

    let mut once = oneshot(&ws);
    assert_eq!(once.step(at(1)).unwrap(), CycleOutcome::NoChanges);
    assert_eq!(ws.log().len(), 1);
}

fn staged_flush(ws: &TestWorkspace) -> WatchState {
    let baseline = ws.engine(&ws.config(), 5).baseline().clone();
    let mut state = WatchState::new(baseline);
    state.pending.record("a.txt".to_string(), ChangeKind::Added);
    state.last_change = Some(at(0));
    state.version = Some(Version::new(1, 2, 3));
    state.releasing = Some(Version::new(1, 2, 4));
    state
}

#[test]
fn test_restart_after_landed_release_does_not_release_again() {
    let ws = TestWorkspace::new();
    ws.write("a.txt", "a");
    ws.seed_version("1.2.3");
    let state = staged_flush(&ws);
    state
        .save_to_disk(ws.path(".relwatch/state.bin"))
        .unwrap();
    // The release files were renamed into place, the final state write was not.
    ws.seed_version("1.2.4");

    let mut engine = ws.engine(&ws.config(), 0);
    assert!(engine.pending().is_empty());
    assert_eq!(engine.step(at(10)).unwrap(), CycleOutcome::NoChanges);
    assert_eq!(ws.version(), "1.2.4");

    let saved = WatchState::load_from_disk(ws.path(".relwatch/state.bin"))
        .unwrap()
        .unwrap();
    assert_eq!(saved.releasing, None);
    assert_eq!(saved.version, Some(Version::new(1, 2, 4)));
}

#[test]
fn test_restart_after_unfinished_release_retries_it() {
    let ws = TestWorkspace::new();
    ws.write("a.txt", "a");
    ws.seed_version("1.2.3");
    let state = staged_flush(&ws);
    state
        .save_to_disk(ws.path(".relwatch/state.bin"))
        .unwrap();

    let mut engine = ws.engine(&ws.config(), 0);
    assert_eq!(engine.pending().len(), 1);
    assert_eq!(
        engine.step(at(10)).unwrap().to_string(),
        "released: version 1.2.4"
    );
    assert_eq!(ws.log().len(), 1);
}

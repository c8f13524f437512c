//! Snapshot differ

use crate::changeset::{ChangeKind, ChangeSet};
use crate::ignore::ArtifactSet;
use crate::snapshot::Snapshot;

/// Compare two snapshots.
///
/// Added: present only in `current`. Removed: present only in `previous`.
/// Modified: present in both with a different fingerprint. Unchanged paths
/// are omitted. Self artifacts are dropped even if the snapshotter let them
/// through.
pub fn diff(previous: &Snapshot, current: &Snapshot, artifacts: &ArtifactSet) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (path, fingerprint) in current {
        if artifacts.contains(path) {
            continue;
        }
        match previous.get(path) {
            None => changes.record(path.clone(), ChangeKind::Added),
            Some(prev) if prev != fingerprint => {
                changes.record(path.clone(), ChangeKind::Modified)
            }
            Some(_) => {}
        }
    }

    for path in previous.keys() {
        if !current.contains_key(path) && !artifacts.contains(path) {
            changes.record(path.clone(), ChangeKind::Removed);
        }
    }

    changes
}

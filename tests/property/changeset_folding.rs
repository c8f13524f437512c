//! Folding a run of consecutive diffs agrees with diffing the endpoints.
//!
//! Paths that end where they started fold to either nothing or `modified`;
//! every other path folds to exactly what a direct diff reports.

use super::diff_partition::snapshot_strategy;
use proptest::prelude::*;
use relwatch::changeset::{ChangeKind, ChangeSet};
use relwatch::ignore::ArtifactSet;
use relwatch::snapshot::diff;

proptest! {
    #[test]
    fn folded_diffs_match_direct_diff(
        snapshots in prop::collection::vec(snapshot_strategy(), 2..6)
    ) {
        let artifacts = ArtifactSet::empty();
        let mut folded = ChangeSet::new();
        for pair in snapshots.windows(2) {
            folded.merge(&diff(&pair[0], &pair[1], &artifacts));
        }

        let first = &snapshots[0];
        let last = &snapshots[snapshots.len() - 1];
        let direct = diff(first, last, &artifacts);

        for (path, kind) in direct.iter() {
            prop_assert_eq!(folded.kind_of(path), Some(kind));
        }
        for (path, kind) in folded.iter() {
            if direct.kind_of(path).is_none() {
                prop_assert_eq!(kind, ChangeKind::Modified);
                prop_assert_eq!(first.get(path), last.get(path));
            }
        }
    }
}

//! Pending change-set: three disjoint path sets.

use crate::types::RelPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Added, modified and removed paths. A path appears in at most one set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeSet<RelPath>,
    pub modified: BTreeSet<RelPath>,
    pub removed: BTreeSet<RelPath>,
}

/// Per-kind path counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

/// Kind of change recorded for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            added: self.added.len(),
            modified: self.modified.len(),
            removed: self.removed.len(),
        }
    }

    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        if self.added.contains(path) {
            Some(ChangeKind::Added)
        } else if self.modified.contains(path) {
            Some(ChangeKind::Modified)
        } else if self.removed.contains(path) {
            Some(ChangeKind::Removed)
        } else {
            None
        }
    }

    /// Record an observation for `path`, folding it into any pending state.
    ///
    /// | pending  | observed | result   |
    /// |----------|----------|----------|
    /// | -        | any      | observed |
    /// | added    | modified | added    |
    /// | added    | removed  | (none)   |
    /// | modified | removed  | removed  |
    /// | removed  | added    | modified |
    pub fn record(&mut self, path: RelPath, kind: ChangeKind) {
        match (self.kind_of(&path), kind) {
            (None, ChangeKind::Added) => {
                self.added.insert(path);
            }
            (None, ChangeKind::Modified) => {
                self.modified.insert(path);
            }
            (None, ChangeKind::Removed) => {
                self.removed.insert(path);
            }
            (Some(ChangeKind::Added), ChangeKind::Removed) => {
                self.added.remove(&path);
            }
            (Some(ChangeKind::Added), _) => {}
            (Some(ChangeKind::Modified), ChangeKind::Removed) => {
                self.modified.remove(&path);
                self.removed.insert(path);
            }
            (Some(ChangeKind::Modified), _) => {}
            (Some(ChangeKind::Removed), ChangeKind::Removed) => {}
            (Some(ChangeKind::Removed), _) => {
                self.removed.remove(&path);
                self.modified.insert(path);
            }
        }
    }

    /// Fold every path of `other` into `self`.
    pub fn merge(&mut self, other: &ChangeSet) {
        for (path, kind) in other.iter() {
            self.record(path.clone(), kind);
        }
    }

    /// Iterate (path, kind) in added, modified, removed order.
    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, ChangeKind)> {
        self.added
            .iter()
            .map(|p| (p, ChangeKind::Added))
            .chain(self.modified.iter().map(|p| (p, ChangeKind::Modified)))
            .chain(self.removed.iter().map(|p| (p, ChangeKind::Removed)))
    }

    /// Drop every path matching `predicate`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.added.retain(|p| keep(p));
        self.modified.retain(|p| keep(p));
        self.removed.retain(|p| keep(p));
    }

    pub fn clear(&mut self) {
        self.added.clear();
        self.modified.clear();
        self.removed.clear();
    }
}

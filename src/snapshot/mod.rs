//! Directory snapshots
//!
//! A snapshot maps every tracked file (root-relative key) to a fingerprint.
//! The watch loop captures one per poll and diffs it against the previous
//! baseline.

pub mod diff;
pub mod fingerprint;
pub mod path;
pub mod walker;

use crate::types::{Fingerprint, RelPath};
use std::collections::BTreeMap;

/// Point-in-time mapping of relative path to fingerprint
pub type Snapshot = BTreeMap<RelPath, Fingerprint>;

pub use diff::diff;
pub use walker::{Walker, WalkerConfig};

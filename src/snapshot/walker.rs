//! Filesystem walker that captures snapshots

use crate::error::ReleaseError;
use crate::ignore::IgnoreSet;
use crate::snapshot::fingerprint::fingerprint_file;
use crate::snapshot::path::relative_key;
use crate::snapshot::Snapshot;
use crate::types::FingerprintMode;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Snapshotter configuration
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Maximum depth to traverse (None = unlimited)
    pub max_depth: Option<usize>,
    /// How file fingerprints are computed
    pub fingerprint: FingerprintMode,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            max_depth: None,
            fingerprint: FingerprintMode::Stamp,
        }
    }
}

/// Captures a [`Snapshot`] of every regular file under a root
pub struct Walker {
    root: PathBuf,
    ignore: IgnoreSet,
    config: WalkerConfig,
}

impl Walker {
    pub fn new(root: PathBuf, ignore: IgnoreSet) -> Self {
        Self {
            root,
            ignore,
            config: WalkerConfig::default(),
        }
    }

    pub fn with_config(root: PathBuf, ignore: IgnoreSet, config: WalkerConfig) -> Self {
        Self {
            root,
            ignore,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignore(&self) -> &IgnoreSet {
        &self.ignore
    }

    /// Walk the root and fingerprint every file that is not ignored.
    ///
    /// A missing root is a configuration error. Entries that cannot be read
    /// (permission denied, vanished mid-walk) are skipped.
    pub fn snapshot(&self) -> Result<Snapshot, ReleaseError> {
        if !self.root.is_dir() {
            return Err(ReleaseError::RootMissing(self.root.clone()));
        }

        let mut snapshot = Snapshot::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|entry| !self.prune(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = relative_key(&self.root, entry.path()) else {
                continue;
            };
            if self.ignore.skip_file(&key) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %key, error = %e, "Skipping file without metadata");
                    continue;
                }
            };
            match fingerprint_file(entry.path(), &metadata, self.config.fingerprint) {
                Ok(fp) => {
                    snapshot.insert(key, fp);
                }
                Err(e) => {
                    debug!(path = %key, error = %e, "Skipping unreadable file");
                }
            }
        }

        Ok(snapshot)
    }

    /// Directories matching the ignore rules are not descended.
    fn prune(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        match relative_key(&self.root, entry.path()) {
            Some(key) => self.ignore.skip_dir(&key),
            None => false,
        }
    }
}

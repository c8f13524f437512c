//! Manifest files that mirror the released version.
//!
//! A manifest is any JSON object file matched by the configured globs. Only
//! manifests that already carry a `version` key are rewritten.

use crate::atomic::write_atomic;
use crate::error::{ReleaseError, StorageError};
use crate::release::version::Version;
use crate::snapshot::path::{file_name, relative_key};
use crate::types::RelPath;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Serialize a JSON document the way the release files are written:
/// two-space indentation and a trailing newline.
pub fn to_pretty_json(value: &Value) -> Result<Vec<u8>, StorageError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Set `version` in one manifest. Returns false when the file has no
/// `version` key or is not a JSON object.
pub fn update_manifest(path: &Path, version: &Version) -> Result<bool, StorageError> {
    let text = fs::read_to_string(path).map_err(|e| StorageError::io_at("read manifest", path, e))?;
    let mut value: Value = serde_json::from_str(&text)?;
    let Some(object) = value.as_object_mut() else {
        return Ok(false);
    };
    if !object.contains_key("version") {
        return Ok(false);
    }
    object.insert("version".to_string(), Value::String(version.to_string()));
    write_atomic(path, &to_pretty_json(&value)?)?;
    Ok(true)
}

/// Manifest globs resolved against one watch root.
#[derive(Debug, Clone)]
pub struct ManifestSet {
    root: PathBuf,
    patterns: GlobSet,
    empty: bool,
    prune_dirs: HashSet<String>,
}

impl ManifestSet {
    /// `prune_dirs` are directory names never searched (e.g. `node_modules`).
    pub fn new(root: &Path, patterns: &[String], prune_dirs: &[String]) -> Result<Self, ReleaseError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    ReleaseError::ConfigError(format!("Invalid manifest glob '{}': {}", pattern, e))
                })?;
            builder.add(glob);
        }
        let patterns_set = builder
            .build()
            .map_err(|e| ReleaseError::ConfigError(format!("Invalid manifest globs: {}", e)))?;
        Ok(Self {
            root: root.to_path_buf(),
            patterns: patterns_set,
            empty: patterns.is_empty(),
            prune_dirs: prune_dirs.iter().cloned().collect(),
        })
    }

    pub fn none(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            patterns: GlobSet::empty(),
            empty: true,
            prune_dirs: HashSet::new(),
        }
    }

    /// Every file under the root matching a manifest glob, sorted.
    pub fn discover(&self) -> Vec<PathBuf> {
        if self.empty {
            return Vec::new();
        }
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !relative_key(&self.root, entry.path())
                        .is_some_and(|key| self.prune_dirs.contains(file_name(&key)))
            });

        let mut found: Vec<PathBuf> = walker
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                relative_key(&self.root, entry.path())
                    .is_some_and(|key| self.patterns.is_match(&key))
            })
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        found
    }

    /// Update every discovered manifest. Failures are logged and skipped;
    /// returns the root-relative paths that were rewritten.
    pub fn update_all(&self, version: &Version) -> Vec<RelPath> {
        let mut updated = Vec::new();
        for path in self.discover() {
            let key = relative_key(&self.root, &path).unwrap_or_else(|| path.display().to_string());
            match update_manifest(&path, version) {
                Ok(true) => {
                    debug!(manifest = %key, version = %version, "Manifest version updated");
                    updated.push(key);
                }
                Ok(false) => {}
                Err(e) => warn!(manifest = %key, error = %e, "Manifest update failed"),
            }
        }
        updated
    }
}

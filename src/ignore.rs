//! Ignore rules for snapshots.
//!
//! Three layers decide whether a path takes part in change detection:
//!
//! 1. Directory names that are pruned wherever they appear (`.git`,
//!    `node_modules`, ...). Pruned directories are never descended.
//! 2. Filename globs (`*.log`, `*.swp`) and path globs (`build/**`), from
//!    configuration and from the optional workspace ignore file.
//! 3. Self artifacts: every file the release flush writes (state directory,
//!    version record, release log, manifests, temp files). These are checked
//!    both while walking and again by the differ, so the watcher can never
//!    trigger itself.

use crate::error::ReleaseError;
use crate::snapshot::path::{file_name, normalize_path_string};
use crate::types::RelPath;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory names skipped by default.
pub const BUILTIN_DIRS: &[&str] = &[
    ".git",
    ".githooks",
    ".github",
    ".idea",
    ".vscode",
    "__pycache__",
    "dist",
    "metrics",
    "node_modules",
    "release-pack",
    "target",
];

/// Filename globs skipped by default.
pub const BUILTIN_GLOBS: &[&str] = &["*.log", "*.tmp", "*.swp", ".DS_Store"];

/// Suffix of staging files written during atomic replacement.
pub const TEMP_SUFFIX: &str = ".relwatch-tmp";

/// Ignore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Directory names pruned anywhere in the tree
    #[serde(default = "default_dirs")]
    pub dirs: Vec<String>,

    /// Glob patterns; patterns without `/` match file names, others match root-relative paths
    #[serde(default = "default_globs")]
    pub globs: Vec<String>,

    /// Optional workspace ignore file (one entry per line, `#` comments)
    #[serde(default = "default_ignore_file")]
    pub ignore_file: Option<PathBuf>,
}

fn default_dirs() -> Vec<String> {
    BUILTIN_DIRS.iter().map(|s| (*s).to_string()).collect()
}

fn default_globs() -> Vec<String> {
    BUILTIN_GLOBS.iter().map(|s| (*s).to_string()).collect()
}

fn default_ignore_file() -> Option<PathBuf> {
    Some(PathBuf::from(".relwatchignore"))
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            dirs: default_dirs(),
            globs: default_globs(),
            ignore_file: default_ignore_file(),
        }
    }
}

/// Read an ignore file into pattern strings (trim, skip empty and `#`).
/// A missing or unreadable file yields no patterns.
pub fn read_ignore_file(path: &Path) -> Vec<String> {
    if !path.is_file() {
        return Vec::new();
    }
    let Ok(contents) = fs::read_to_string(path) else {
        warn!(path = %path.display(), "Ignore file unreadable, skipping");
        return Vec::new();
    };
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn build_glob(pattern: &str) -> Result<Glob, ReleaseError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| ReleaseError::ConfigError(format!("Invalid glob '{}': {}", pattern, e)))
}

fn build_set(patterns: &[String]) -> Result<GlobSet, ReleaseError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern)?);
    }
    builder
        .build()
        .map_err(|e| ReleaseError::ConfigError(format!("Invalid glob set: {}", e)))
}

/// Paths the release flush writes itself.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    files: HashSet<RelPath>,
    dirs: Vec<RelPath>,
    globs: GlobSet,
}

impl ArtifactSet {
    /// `dirs` are pruned recursively, `files` match exactly, `globs` match
    /// root-relative paths (used for manifest patterns).
    pub fn new(dirs: &[String], files: &[String], globs: &[String]) -> Result<Self, ReleaseError> {
        let mut patterns: Vec<String> = globs.to_vec();
        patterns.push(format!("**/*{}", TEMP_SUFFIX));
        patterns.push(format!("*{}", TEMP_SUFFIX));
        Ok(Self {
            files: files.iter().map(|f| normalize_path_string(f)).collect(),
            dirs: dirs.iter().map(|d| normalize_path_string(d)).collect(),
            globs: build_set(&patterns)?,
        })
    }

    /// An artifact set that only recognizes temp files.
    pub fn empty() -> Self {
        Self::new(&[], &[], &[]).unwrap_or(Self {
            files: HashSet::new(),
            dirs: Vec::new(),
            globs: GlobSet::empty(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        if self.files.contains(key) {
            return true;
        }
        if self
            .dirs
            .iter()
            .any(|d| key == d || key.strip_prefix(d.as_str()).is_some_and(|rest| rest.starts_with('/')))
        {
            return true;
        }
        self.globs.is_match(key)
    }

    /// True when `key` names an artifact directory (pruned during the walk).
    pub fn is_artifact_dir(&self, key: &str) -> bool {
        self.dirs.iter().any(|d| d == key)
    }
}

/// Compiled ignore rules for one watch root.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    dir_names: HashSet<String>,
    name_globs: GlobSet,
    path_globs: GlobSet,
    artifacts: ArtifactSet,
}

impl IgnoreSet {
    /// Compile configuration plus the workspace ignore file under `root`.
    pub fn from_config(
        root: &Path,
        config: &IgnoreConfig,
        artifacts: ArtifactSet,
    ) -> Result<Self, ReleaseError> {
        let mut entries: Vec<String> = config.globs.clone();
        if let Some(ref file) = config.ignore_file {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                root.join(file)
            };
            let extra = read_ignore_file(&path);
            if !extra.is_empty() {
                debug!(path = %path.display(), count = extra.len(), "Loaded ignore file");
            }
            entries.extend(extra);
        }

        let mut dir_names: HashSet<String> = config.dirs.iter().cloned().collect();
        let mut name_patterns = Vec::new();
        let mut path_patterns = Vec::new();
        for entry in entries {
            let entry = normalize_path_string(&entry);
            if entry.is_empty() {
                continue;
            }
            let has_meta = entry.contains(['*', '?', '[']);
            if let Some(dir) = entry.strip_suffix('/') {
                dir_names.insert(dir.to_string());
            } else if entry.contains('/') {
                if !has_meta {
                    path_patterns.push(format!("{}/**", entry));
                }
                path_patterns.push(entry);
            } else if has_meta {
                name_patterns.push(entry);
            } else {
                dir_names.insert(entry.clone());
                name_patterns.push(entry);
            }
        }

        Ok(Self {
            dir_names,
            name_globs: build_set(&name_patterns)?,
            path_globs: build_set(&path_patterns)?,
            artifacts,
        })
    }

    /// Ignore set with built-in defaults and the given artifacts, no ignore file.
    pub fn with_defaults(artifacts: ArtifactSet) -> Result<Self, ReleaseError> {
        let config = IgnoreConfig {
            ignore_file: None,
            ..IgnoreConfig::default()
        };
        Self::from_config(Path::new("."), &config, artifacts)
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Whether a directory (by root-relative key) should be pruned.
    pub fn skip_dir(&self, key: &str) -> bool {
        self.dir_names.contains(file_name(key))
            || self.artifacts.is_artifact_dir(key)
            || self.path_globs.is_match(key)
    }

    /// Whether a file (by root-relative key) should be left out of the snapshot.
    pub fn skip_file(&self, key: &str) -> bool {
        self.name_globs.is_match(file_name(key))
            || self.path_globs.is_match(key)
            || self.artifacts.contains(key)
    }
}

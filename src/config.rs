//! Configuration System
//!
//! Layered configuration for the release watcher: watch timing, ignore
//! rules, freeze windows, release files, classification rules and logging.
//! See [`ConfigLoader`] for source precedence.

use crate::classify::{default_rules, ClassifyRule, PrefixClassifier};
use crate::error::ReleaseError;
use crate::freeze::FreezeConfig;
use crate::ignore::{ArtifactSet, IgnoreConfig, IgnoreSet};
use crate::logging::LoggingConfig;
use crate::release::entry::EntryTemplate;
use crate::release::ReleaseConfig;
use crate::snapshot::path::{normalize_path_string, relative_key};
use crate::types::FingerprintMode;
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelwatchConfig {
    #[serde(default)]
    pub watch: WatchSettings,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    #[serde(default)]
    pub freeze: FreezeConfig,

    #[serde(default)]
    pub release: ReleaseConfig,

    /// Category rules, first match wins; empty means built-in rules
    #[serde(default)]
    pub classify: Vec<ClassifyRule>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Seconds between snapshots
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    /// Quiet seconds required before pending changes are released
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    #[serde(default)]
    pub fingerprint: FingerprintMode,

    /// Wake the loop early on native filesystem events
    #[serde(default)]
    pub native_events: bool,

    /// Watch state directory, relative to the root unless absolute
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_interval_secs() -> f64 {
    5.0
}

fn default_cooldown_secs() -> f64 {
    5.0
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".relwatch")
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cooldown_secs: default_cooldown_secs(),
            fingerprint: FingerprintMode::default(),
            native_events: false,
            state_dir: default_state_dir(),
            follow_symlinks: false,
        }
    }
}

impl WatchSettings {
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::from_secs(5))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::from_secs(5))
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Watch(String),
    Ignore(String),
    Freeze(String),
    Release(String),
    Classify(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Watch(msg) => write!(f, "watch: {}", msg),
            ValidationError::Ignore(msg) => write!(f, "ignore: {}", msg),
            ValidationError::Freeze(msg) => write!(f, "freeze: {}", msg),
            ValidationError::Release(msg) => write!(f, "release: {}", msg),
            ValidationError::Classify(msg) => write!(f, "classify: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn check_globs(patterns: &[String]) -> Result<(), String> {
    for pattern in patterns {
        Glob::new(pattern).map_err(|e| format!("invalid glob '{}': {}", pattern, e))?;
    }
    Ok(())
}

/// Resolve `path` against `root` when relative.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl RelwatchConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let watch = &self.watch;
        if !watch.interval_secs.is_finite() || watch.interval_secs <= 0.0 {
            errors.push(ValidationError::Watch(format!(
                "interval_secs must be positive, got {}",
                watch.interval_secs
            )));
        }
        if !watch.cooldown_secs.is_finite() || watch.cooldown_secs < 0.0 {
            errors.push(ValidationError::Watch(format!(
                "cooldown_secs must be zero or positive, got {}",
                watch.cooldown_secs
            )));
        }
        if watch.state_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Watch("state_dir cannot be empty".to_string()));
        }

        if let Err(e) = check_globs(&self.ignore.globs) {
            errors.push(ValidationError::Ignore(e));
        }

        if self.freeze.calendar.as_ref().is_some_and(|c| c.as_os_str().is_empty()) {
            errors.push(ValidationError::Freeze("calendar path cannot be empty".to_string()));
        }

        let release = &self.release;
        if release.version_file.as_os_str().is_empty() {
            errors.push(ValidationError::Release("version_file cannot be empty".to_string()));
        }
        if release.log_file.as_os_str().is_empty() {
            errors.push(ValidationError::Release("log_file cannot be empty".to_string()));
        }
        if !release.version_file.as_os_str().is_empty() && release.version_file == release.log_file {
            errors.push(ValidationError::Release(
                "version_file and log_file must differ".to_string(),
            ));
        }
        if let Err(e) = check_globs(&release.manifests) {
            errors.push(ValidationError::Release(e));
        }

        for (index, rule) in self.classify.iter().enumerate() {
            if rule.category.trim().is_empty() {
                errors.push(ValidationError::Classify(format!(
                    "rule {} has an empty category",
                    index
                )));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn state_dir(&self, root: &Path) -> PathBuf {
        resolve_under(root, &self.watch.state_dir)
    }

    /// Root-relative key for a configured file, or `None` if it lies outside the root.
    fn artifact_key(root: &Path, path: &Path) -> Option<String> {
        if path.is_absolute() {
            relative_key(root, path)
        } else {
            Some(normalize_path_string(&path.to_string_lossy()))
        }
    }

    /// Every path a release writes, relative to `root`.
    pub fn artifact_set(&self, root: &Path) -> Result<ArtifactSet, ReleaseError> {
        let dirs: Vec<String> = Self::artifact_key(root, &self.watch.state_dir)
            .into_iter()
            .collect();
        let files: Vec<String> = [&self.release.version_file, &self.release.log_file]
            .into_iter()
            .filter_map(|p| Self::artifact_key(root, p))
            .collect();
        ArtifactSet::new(&dirs, &files, &self.release.manifests)
    }

    pub fn ignore_set(&self, root: &Path) -> Result<IgnoreSet, ReleaseError> {
        IgnoreSet::from_config(root, &self.ignore, self.artifact_set(root)?)
    }

    pub fn classifier(&self) -> PrefixClassifier {
        if self.classify.is_empty() {
            PrefixClassifier::new(default_rules())
        } else {
            PrefixClassifier::new(self.classify.clone())
        }
    }

    pub fn entry_template(&self) -> EntryTemplate {
        EntryTemplate {
            status: self.release.status.clone(),
            author: self.release.author.clone(),
            ..EntryTemplate::default()
        }
    }
}

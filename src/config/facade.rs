//! Layered configuration loading.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::RelwatchConfig;
use crate::error::ReleaseError;
use config::{Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`RelwatchConfig`] from defaults, files and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Built-in defaults only.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> RelwatchConfig {
        RelwatchConfig::default()
    }

    /// Precedence, lowest first: defaults, global file, workspace files,
    /// `RELWATCH__SECTION__KEY` environment, `RELEASE_COOLDOWN`.
    pub fn load(workspace_root: &Path) -> Result<RelwatchConfig, ReleaseError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Self::environment());
        Self::finish(builder.build()?.try_deserialize()?)
    }

    /// Defaults plus exactly one file (and environment overrides).
    pub fn load_from_file(path: &Path) -> Result<RelwatchConfig, ReleaseError> {
        if !path.is_file() {
            return Err(ReleaseError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .add_source(Self::environment());
        Self::finish(builder.build()?.try_deserialize()?)
    }

    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn environment() -> Environment {
        Environment::with_prefix("RELWATCH")
            .separator("__")
            .try_parsing(true)
    }

    fn finish(mut config: RelwatchConfig) -> Result<RelwatchConfig, ReleaseError> {
        if let Some(cooldown) = merge_policy::legacy_cooldown() {
            debug!(cooldown_secs = cooldown, "Cooldown overridden by RELEASE_COOLDOWN");
            config.watch.cooldown_secs = cooldown;
        }
        config.validate().map_err(|errors| {
            ReleaseError::ConfigError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(config)
    }
}

//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("watch.interval_secs", 5.0)?
        .set_default("watch.cooldown_secs", 5.0)?
        .set_default("watch.state_dir", ".relwatch")?
        .set_default("release.version_file", "version.json")?
        .set_default("release.log_file", "release-log.json")
}

/// Legacy cooldown override (`RELEASE_COOLDOWN`, seconds). Unparseable
/// values are ignored.
pub fn legacy_cooldown() -> Option<f64> {
    let raw = std::env::var("RELEASE_COOLDOWN").ok()?;
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(secs),
        _ => {
            tracing::warn!(value = %raw, "Ignoring invalid RELEASE_COOLDOWN");
            None
        }
    }
}

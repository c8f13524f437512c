//! CLI route: single route table and run context. Dispatches to the engine,
//! watcher and presentation.

use crate::cli::help::{command_name, is_mutating};
use crate::cli::output::{CommandOutput, EXIT_FROZEN};
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_cycle_line, format_freeze, format_init_summary, format_log, format_once_result,
    format_status, format_watch_summary, FreezeReport,
};
use crate::config::{ConfigLoader, RelwatchConfig};
use crate::engine::{CycleOutcome, ReleaseEngine};
use crate::error::ReleaseError;
use crate::freeze::FreezeGate;
use crate::init::initialize;
use crate::release::manifest::ManifestSet;
use crate::release::{FileReleaseStore, ReleaseStore};
use crate::tooling::{ReleaseWatcher, WatchOptions};
use crate::types::ReleaseSource;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runtime context for CLI execution: watch root and loaded configuration.
pub struct RunContext {
    root: PathBuf,
    config: RelwatchConfig,
}

impl RunContext {
    /// Load configuration for `root`, or from `config_path` alone when given.
    pub fn new(root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ReleaseError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&root)?,
        };
        Ok(Self { root, config })
    }

    pub fn with_config(root: PathBuf, config: RelwatchConfig) -> Self {
        Self { root, config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RelwatchConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ReleaseError> {
        let started = Instant::now();
        let name = command_name(command);
        debug!(command = name, mutating = is_mutating(command), "Executing command");
        let result = self.execute_inner(command);
        if result.is_ok() {
            debug!(
                command = name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Command completed"
            );
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, ReleaseError> {
        match command {
            Commands::Watch {
                interval,
                cooldown,
                native_events,
                override_freeze,
            } => self.handle_watch(*interval, *cooldown, *native_events, *override_freeze),
            Commands::Once {
                format,
                override_freeze,
            } => self.handle_once(format, *override_freeze),
            Commands::Status { format } => self.handle_status(format),
            Commands::Log { limit, format } => self.handle_log(*limit, format),
            Commands::Freeze { format } => self.handle_freeze(format),
            Commands::Init { force } => {
                let summary = initialize(&self.root, *force)?;
                Ok(CommandOutput::ok(format_init_summary(&summary)))
            }
        }
    }

    fn watch_config(
        &self,
        interval: Option<f64>,
        cooldown: Option<f64>,
        native_events: bool,
        override_freeze: bool,
    ) -> Result<RelwatchConfig, ReleaseError> {
        let mut config = self.config.clone();
        if let Some(secs) = interval {
            config.watch.interval_secs = secs;
        }
        if let Some(secs) = cooldown {
            config.watch.cooldown_secs = secs;
        }
        if native_events {
            config.watch.native_events = true;
        }
        if override_freeze {
            config.freeze.override_release = true;
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

    fn handle_watch(
        &self,
        interval: Option<f64>,
        cooldown: Option<f64>,
        native_events: bool,
        override_freeze: bool,
    ) -> Result<CommandOutput, ReleaseError> {
        let config = self.watch_config(interval, cooldown, native_events, override_freeze)?;
        let engine = ReleaseEngine::open(
            &self.root,
            &config,
            ReleaseSource::Watcher,
            config.watch.cooldown(),
        )?;
        info!(
            version = %engine.current_version()?,
            cooldown_secs = config.watch.cooldown_secs,
            "Release watcher ready"
        );

        let mut watcher = ReleaseWatcher::new(
            engine,
            WatchOptions {
                interval: config.watch.interval(),
                native_events: config.watch.native_events,
                handle_interrupt: true,
            },
        )
        .on_cycle(|outcome| {
            if !matches!(outcome, CycleOutcome::NoChanges) {
                println!("{}", format_cycle_line(outcome));
            }
        });
        let summary = watcher.run_blocking()?;
        Ok(CommandOutput::ok(format_watch_summary(&summary)))
    }

    fn handle_once(&self, format: &str, override_freeze: bool) -> Result<CommandOutput, ReleaseError> {
        let config = self.watch_config(None, None, false, override_freeze)?;
        let mut engine =
            ReleaseEngine::open(&self.root, &config, ReleaseSource::Oneshot, Duration::ZERO)?;
        let outcome = engine.step(Utc::now())?;
        let text = format_once_result(&outcome, format)?;
        let code = match outcome {
            CycleOutcome::Deferred { .. } => EXIT_FROZEN,
            _ => 0,
        };
        Ok(CommandOutput::with_code(text, code))
    }

    fn handle_status(&self, format: &str) -> Result<CommandOutput, ReleaseError> {
        let engine = ReleaseEngine::open(
            &self.root,
            &self.config,
            ReleaseSource::Watcher,
            self.config.watch.cooldown(),
        )?;
        let status = engine.status(Utc::now())?;
        Ok(CommandOutput::ok(format_status(&status, format)?))
    }

    fn file_store(&self) -> Result<FileReleaseStore, ReleaseError> {
        if !self.root.is_dir() {
            return Err(ReleaseError::RootMissing(self.root.clone()));
        }
        let state_dir = self.config.state_dir(&self.root);
        Ok(FileReleaseStore::new(
            &self.root,
            &state_dir,
            &self.config.release,
            ManifestSet::none(&self.root),
        ))
    }

    fn handle_log(&self, limit: usize, format: &str) -> Result<CommandOutput, ReleaseError> {
        let entries = self.file_store()?.log(Some(limit))?;
        Ok(CommandOutput::ok(format_log(&entries, format)?))
    }

    fn handle_freeze(&self, format: &str) -> Result<CommandOutput, ReleaseError> {
        if !self.root.is_dir() {
            return Err(ReleaseError::RootMissing(self.root.clone()));
        }
        let gate = FreezeGate::load(&self.root, &self.config.freeze)?;
        let now = Utc::now();
        let report = FreezeReport::new(
            now,
            gate.calendar_path().map(Path::to_path_buf),
            gate.windows(),
            gate.check(now),
            gate.override_active(),
        );
        Ok(CommandOutput::ok(format_freeze(&report, format)?))
    }
}

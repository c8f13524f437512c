//! Watch Mode
//!
//! Polls the engine every interval until interrupted. Stop requests and
//! Ctrl-C are only observed between cycles, never during a flush.
//!
//! With native events enabled a `notify` watcher wakes the loop early. The
//! wake only shortens the sleep: every cycle still goes through the same
//! snapshot, diff and debounce path.

use crate::clock::{Clock, SystemClock};
use crate::engine::{CycleOutcome, ReleaseEngine};
use crate::error::{ReleaseError, StorageError};
use crate::ignore::ArtifactSet;
use crate::snapshot::path::relative_key;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

/// Watch loop configuration
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Time between polls
    pub interval: Duration,
    /// Wake early on native filesystem events
    pub native_events: bool,
    /// Stop on Ctrl-C
    pub handle_interrupt: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            native_events: false,
            handle_interrupt: true,
        }
    }
}

/// Totals for one watch session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchSummary {
    pub cycles: u64,
    pub releases: u64,
    pub deferred: u64,
    pub errors: u64,
    pub last_version: Option<String>,
}

/// Requests a running watcher to stop after its current cycle.
#[derive(Clone)]
pub struct StopHandle {
    stop: Arc<Notify>,
    running: Arc<RwLock<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        *self.running.write() = false;
        self.stop.notify_one();
    }
}

type CycleHook = Box<dyn FnMut(&CycleOutcome) + Send>;

pub struct ReleaseWatcher {
    engine: ReleaseEngine,
    options: WatchOptions,
    clock: Arc<dyn Clock>,
    stop: Arc<Notify>,
    running: Arc<RwLock<bool>>,
    on_cycle: Option<CycleHook>,
}

impl ReleaseWatcher {
    pub fn new(engine: ReleaseEngine, options: WatchOptions) -> Self {
        Self {
            engine,
            options,
            clock: Arc::new(SystemClock),
            stop: Arc::new(Notify::new()),
            running: Arc::new(RwLock::new(true)),
            on_cycle: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Called with every successful cycle's report.
    pub fn on_cycle(mut self, hook: impl FnMut(&CycleOutcome) + Send + 'static) -> Self {
        self.on_cycle = Some(Box::new(hook));
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: Arc::clone(&self.stop),
            running: Arc::clone(&self.running),
        }
    }

    pub fn engine(&self) -> &ReleaseEngine {
        &self.engine
    }

    pub fn into_engine(self) -> ReleaseEngine {
        self.engine
    }

    /// Run until stopped. Retryable failures are logged and the loop goes
    /// on; anything else ends the session with the error.
    pub async fn run(&mut self) -> Result<WatchSummary, ReleaseError> {
        let mut summary = WatchSummary::default();

        let (wake_tx, mut wake_rx) = mpsc::unbounded_channel::<()>();
        let _native = if self.options.native_events {
            match start_native_watcher(self.engine.root(), self.engine.artifacts().clone(), wake_tx) {
                Ok(watcher) => {
                    debug!("Native filesystem events enabled");
                    Some(watcher)
                }
                Err(e) => {
                    warn!(error = %e, "Native filesystem events unavailable, polling only");
                    None
                }
            }
        } else {
            drop(wake_tx);
            None
        };

        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        info!(
            root = %self.engine.root().display(),
            interval_ms = self.options.interval.as_millis() as u64,
            "Watching for changes"
        );

        while *self.running.read() {
            self.cycle(&mut summary)?;

            tokio::select! {
                _ = tokio::time::sleep(self.options.interval) => {}
                _ = self.stop.notified() => {
                    debug!("Stop requested");
                    break;
                }
                res = &mut interrupt, if self.options.handle_interrupt => {
                    if let Err(e) = res {
                        warn!(error = %e, "Interrupt handler failed");
                    }
                    info!("Interrupt received");
                    break;
                }
                Some(()) = wake_rx.recv() => {
                    while wake_rx.try_recv().is_ok() {}
                    debug!("Woken by filesystem event");
                }
            }
        }

        *self.running.write() = false;
        info!(
            cycles = summary.cycles,
            releases = summary.releases,
            deferred = summary.deferred,
            errors = summary.errors,
            "Watch stopped"
        );
        Ok(summary)
    }

    /// Run on a fresh current-thread runtime.
    pub fn run_blocking(&mut self) -> Result<WatchSummary, ReleaseError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StorageError::IoError)?;
        runtime.block_on(self.run())
    }

    fn cycle(&mut self, summary: &mut WatchSummary) -> Result<(), ReleaseError> {
        summary.cycles += 1;
        match self.engine.tick(self.clock.as_ref()) {
            Ok(outcome) => {
                match &outcome {
                    CycleOutcome::Released { version, .. } => {
                        summary.releases += 1;
                        summary.last_version = Some(version.clone());
                    }
                    CycleOutcome::Deferred { .. } => summary.deferred += 1,
                    CycleOutcome::Accumulating { remaining_secs, counts } => {
                        debug!(
                            remaining_secs,
                            pending = counts.total(),
                            "Waiting for the tree to settle"
                        );
                    }
                    _ => {}
                }
                if let Some(hook) = self.on_cycle.as_mut() {
                    hook(&outcome);
                }
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                summary.errors += 1;
                warn!(error = %e, "Cycle failed, retrying next poll");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Cycle failed");
                Err(e)
            }
        }
    }
}

fn is_relevant(event: &Event, root: &Path, artifacts: &ArtifactSet) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path: &PathBuf| {
        relative_key(root, path).map_or(true, |key| !artifacts.contains(&key))
    })
}

fn start_native_watcher(
    root: &Path,
    artifacts: ArtifactSet,
    wake: mpsc::UnboundedSender<()>,
) -> Result<RecommendedWatcher, StorageError> {
    let event_root = root.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_relevant(&event, &event_root, &artifacts) {
                let _ = wake.send(());
            }
        }
        Err(e) => warn!("Watch error: {}", e),
    })
    .map_err(|e| {
        StorageError::IoError(std::io::Error::other(format!(
            "Failed to create watcher: {}",
            e
        )))
    })?;

    watcher.watch(root, RecursiveMode::Recursive).map_err(|e| {
        StorageError::IoError(std::io::Error::other(format!(
            "Failed to watch directory: {}",
            e
        )))
    })?;
    Ok(watcher)
}

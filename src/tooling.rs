//! Long-running drivers for the release engine.
//!
//! The engine itself is synchronous and clock-driven; this layer owns the
//! poll timer, interrupt handling and optional native filesystem wake-ups.

pub mod watch;

pub use watch::{ReleaseWatcher, StopHandle, WatchOptions, WatchSummary};

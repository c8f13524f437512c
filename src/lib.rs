//! relwatch: Debounced, Freeze-Aware Automatic Releases
//!
//! Polls a directory tree, folds the differences between snapshots into a
//! pending change-set, and once the tree has been quiet for a cooldown
//! records a patch release: the version record and a newest-first release
//! log are replaced atomically. Releases are held back while a freeze window
//! is active unless an override is granted.

pub mod aggregator;
pub mod atomic;
pub mod changeset;
pub mod classify;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod freeze;
pub mod ignore;
pub mod init;
pub mod logging;
pub mod release;
pub mod snapshot;
pub mod state;
pub mod tooling;
pub mod types;

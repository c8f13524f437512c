//! CLI parse: clap types for relwatch. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relwatch - automatic patch releases driven by file changes
#[derive(Parser)]
#[command(name = "relwatch")]
#[command(about = "Watch a directory and record a patch release once changes settle")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory to watch
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v', default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short = 'q', default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the tree and release after each quiet period until interrupted
    Watch {
        /// Seconds between polls
        #[arg(long)]
        interval: Option<f64>,
        /// Quiet seconds required before a release
        #[arg(long)]
        cooldown: Option<f64>,
        /// Wake early on native filesystem events
        #[arg(long)]
        native_events: bool,
        /// Release even inside a freeze window
        #[arg(long = "override")]
        override_freeze: bool,
    },
    /// Run one diff-and-release cycle without waiting for a quiet period
    Once {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Release even inside a freeze window
        #[arg(long = "override")]
        override_freeze: bool,
    },
    /// Show the current version, pending changes and freeze state
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the newest release log entries
    Log {
        /// Maximum number of entries
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show freeze windows and whether a release may fire now
    Freeze {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Write a starter workspace config and ignore file
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

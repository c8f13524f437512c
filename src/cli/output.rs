//! CLI output: error mapping and exit codes.

use crate::error::ReleaseError;

/// Exit code for success (released or nothing to release).
pub const EXIT_OK: i32 = 0;
/// Exit code for any error.
pub const EXIT_ERROR: i32 = 1;
/// Exit code for a one-shot run that was held back by a freeze window.
pub const EXIT_FROZEN: i32 = 2;

/// Rendered command result plus the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(text: String) -> Self {
        Self {
            text,
            exit_code: EXIT_OK,
        }
    }

    pub fn with_code(text: String, exit_code: i32) -> Self {
        Self { text, exit_code }
    }
}

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ReleaseError) -> String {
    format!("error: {}", e)
}

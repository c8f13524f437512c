//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name recorded on log events (e.g. "watch", "once").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Watch { .. } => "watch",
        Commands::Once { .. } => "once",
        Commands::Status { .. } => "status",
        Commands::Log { .. } => "log",
        Commands::Freeze { .. } => "freeze",
        Commands::Init { .. } => "init",
    }
}

/// Whether a command may write to the workspace.
pub fn is_mutating(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Watch { .. } | Commands::Once { .. } | Commands::Init { .. }
    )
}

//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{map_error, CommandOutput, EXIT_ERROR, EXIT_FROZEN, EXIT_OK};
pub use parse::{Cli, Commands};
pub use presentation::{format_cycle_line, format_section_heading, FreezeReport};
pub use route::RunContext;

//! Integration tests for the relwatch release watcher


mod cli_commands;
mod config_integration;
mod freeze_calendar;
mod persistence;
mod release_scenarios;
mod shared_root;
mod watch_loop;

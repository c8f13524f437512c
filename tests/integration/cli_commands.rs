//! CLI commands through the route table.

use super::test_utils::TestWorkspace;
use clap::Parser;
use relwatch::cli::{Cli, Commands, RunContext, EXIT_FROZEN, EXIT_OK};
use relwatch::config::RelwatchConfig;
use relwatch::freeze::FreezeWindowConfig;
use serde_json::Value;

fn once(format: &str) -> Commands {
    Commands::Once {
        format: format.to_string(),
        override_freeze: false,
    }
}

fn json(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

#[test]
fn test_parse_global_flags_and_subcommands() {
    let cli = Cli::try_parse_from([
        "relwatch",
        "--root",
        "/srv/app",
        "--log-format",
        "json",
        "watch",
        "--interval",
        "2.5",
        "--cooldown",
        "10",
        "--override",
    ])
    .unwrap();
    assert_eq!(cli.root.to_str(), Some("/srv/app"));
    assert_eq!(cli.log_format.as_deref(), Some("json"));
    match cli.command {
        Commands::Watch {
            interval,
            cooldown,
            native_events,
            override_freeze,
        } => {
            assert_eq!(interval, Some(2.5));
            assert_eq!(cooldown, Some(10.0));
            assert!(!native_events);
            assert!(override_freeze);
        }
        _ => panic!("expected watch"),
    }

    let cli = Cli::try_parse_from(["relwatch", "log", "--limit", "3"]).unwrap();
    assert!(matches!(cli.command, Commands::Log { limit: 3, .. }));
}

#[test]
fn test_once_json_reports_release() {
    let ws = TestWorkspace::new();
    let ctx = RunContext::with_config(ws.root().to_path_buf(), ws.config());

    let first = ctx.execute(&once("json")).unwrap();
    assert_eq!(json(&first.text)["outcome"], "no_changes");

    ws.write("src/main.ts", "console.log(1)");
    let second = ctx.execute(&once("json")).unwrap();
    assert_eq!(second.exit_code, EXIT_OK);
    let report = json(&second.text);
    assert_eq!(report["outcome"], "released");
    assert_eq!(report["version"], "0.0.1");
    assert_eq!(report["counts"]["added"], 1);
}

#[test]
fn test_once_frozen_exit_code() {
    let ws = TestWorkspace::new();
    let mut config = ws.config();
    config.freeze.windows.push(FreezeWindowConfig {
        start: "2000-01-01T00:00:00Z".to_string(),
        end: "2999-12-31T23:59:59Z".to_string(),
    });
    let ctx = RunContext::with_config(ws.root().to_path_buf(), config);

    ctx.execute(&once("text")).unwrap();
    ws.write("a.txt", "a");
    let frozen = ctx.execute(&once("json")).unwrap();
    assert_eq!(frozen.exit_code, EXIT_FROZEN);
    assert_eq!(json(&frozen.text)["outcome"], "deferred");
    assert!(!ws.path("version.json").exists());
}

#[test]
fn test_status_is_read_only() {
    let ws = TestWorkspace::new();
    ws.write("a.txt", "a");
    let ctx = RunContext::with_config(ws.root().to_path_buf(), ws.config());

    let status = ctx
        .execute(&Commands::Status {
            format: "json".to_string(),
        })
        .unwrap();
    let report = json(&status.text);
    assert_eq!(report["version"], "0.0.0");
    assert_eq!(report["tracked_files"], 1);
    assert_eq!(report["state"], "idle");
    assert!(!ws.path(".relwatch/state.bin").exists());
}

#[test]
fn test_status_shows_pending_after_deferral() {
    let ws = TestWorkspace::new();
    let mut config = ws.config();
    config.freeze.windows.push(FreezeWindowConfig {
        start: "2000-01-01T00:00:00Z".to_string(),
        end: "2999-12-31T23:59:59Z".to_string(),
    });
    let ctx = RunContext::with_config(ws.root().to_path_buf(), config);
    ctx.execute(&once("text")).unwrap();
    ws.write("docs/a.md", "a");
    ctx.execute(&once("text")).unwrap();

    let status = ctx
        .execute(&Commands::Status {
            format: "json".to_string(),
        })
        .unwrap();
    let report = json(&status.text);
    assert_eq!(report["pending"]["added"], 1);
    assert_eq!(report["pending_paths"][0], "added: docs/a.md");
    assert!(report["frozen_until"].is_string());

    let text = ctx
        .execute(&Commands::Status {
            format: "text".to_string(),
        })
        .unwrap();
    assert!(text.text.contains("docs/a.md"));
    assert!(text.text.contains("Frozen until 2999-12-31T23:59:59Z"));
}

#[test]
fn test_log_limit_and_text() {
    let ws = TestWorkspace::new();
    let ctx = RunContext::with_config(ws.root().to_path_buf(), RelwatchConfig::default());
    let empty = ctx
        .execute(&Commands::Log {
            limit: 10,
            format: "text".to_string(),
        })
        .unwrap();
    assert_eq!(empty.text, "No releases recorded.");

    ctx.execute(&once("text")).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        ws.write(name, name);
        ctx.execute(&once("text")).unwrap();
    }
    let limited = ctx
        .execute(&Commands::Log {
            limit: 2,
            format: "json".to_string(),
        })
        .unwrap();
    let entries = json(&limited.text);
    assert_eq!(entries.as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["version"], "0.0.3");

    let table = ctx
        .execute(&Commands::Log {
            limit: 10,
            format: "text".to_string(),
        })
        .unwrap();
    assert!(table.text.contains("0.0.1"));
    assert!(table.text.contains("+1 ~0 -0"));
    assert!(table.text.contains("Risk"));
    assert!(table.text.contains("low"));
}

#[test]
fn test_freeze_command_reports_decision() {
    let ws = TestWorkspace::new();
    ws.write(
        "release-calendar.yml",
        "- start: 2000-01-01T00:00:00Z\n  end: 2001-01-01T00:00:00Z\n",
    );
    let ctx = RunContext::with_config(ws.root().to_path_buf(), ws.config());
    let out = ctx
        .execute(&Commands::Freeze {
            format: "json".to_string(),
        })
        .unwrap();
    let report = json(&out.text);
    assert_eq!(report["decision"], "open");
    assert_eq!(report["windows"].as_array().unwrap().len(), 1);
}

#[test]
fn test_init_writes_loadable_config() {
    let ws = TestWorkspace::new();
    let ctx = RunContext::with_config(ws.root().to_path_buf(), RelwatchConfig::default());
    let out = ctx.execute(&Commands::Init { force: false }).unwrap();
    assert!(out.text.contains("config.toml"));

    let text = std::fs::read_to_string(ws.path(".relwatch/config.toml")).unwrap();
    let parsed: RelwatchConfig = toml::from_str(&text).unwrap();
    assert!(parsed.validate().is_ok());

    let again = ctx.execute(&Commands::Init { force: false }).unwrap();
    assert!(again.text.contains("already exists"));
}

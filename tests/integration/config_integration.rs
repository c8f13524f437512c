//! Integration tests for configuration loading and its effect on releases.

use super::test_utils::{at, TestWorkspace, ENV_MUTEX};
use relwatch::cli::{Commands, RunContext};
use relwatch::config::ConfigLoader;
use relwatch::engine::CycleOutcome;
use relwatch::types::FingerprintMode;

const WORKSPACE_CONFIG: &str = r#"
[watch]
cooldown_secs = 0
fingerprint = "content"

[release]
version_file = "meta/version.json"
log_file = "meta/release-log.json"
status = "Beta"
author = "CI"

[[classify]]
category = "frontend"
prefixes = ["web/"]
impact = "security"
risk = "high"
"#;

#[test]
fn test_workspace_config_relocates_release_files() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let ws = TestWorkspace::new();
    std::env::set_var("XDG_CONFIG_HOME", ws.path("xdg-empty"));
    ws.write(".relwatch/config.toml", WORKSPACE_CONFIG);

    let config = ConfigLoader::load(ws.root()).unwrap();
    std::env::remove_var("XDG_CONFIG_HOME");
    assert_eq!(config.watch.fingerprint, FingerprintMode::Content);
    assert_eq!(config.watch.cooldown_secs, 0.0);

    let mut engine = ws.engine(&config, 0);
    ws.write("web/index.html", "<html></html>");
    assert!(engine.step(at(0)).unwrap().is_release());

    let log = ws.read_json("meta/release-log.json");
    assert_eq!(log[0]["status"], "Beta");
    assert_eq!(log[0]["author"], "CI");
    assert_eq!(log[0]["categories"][0], "frontend");
    assert_eq!(log[0]["impact"], "security");
    assert_eq!(log[0]["risk"], "high");
    assert_eq!(ws.read_json("meta/version.json")["version"], "0.0.1");
    assert!(!ws.path("version.json").exists());

    // The relocated release files are artifacts too.
    assert_eq!(engine.step(at(1)).unwrap(), CycleOutcome::NoChanges);
}

#[test]
fn test_run_context_with_explicit_config_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let ws = TestWorkspace::new();
    ws.write("custom.toml", WORKSPACE_CONFIG);

    let ctx = RunContext::new(ws.root().to_path_buf(), Some(ws.path("custom.toml"))).unwrap();
    assert_eq!(ctx.config().release.status, "Beta");

    ctx.execute(&Commands::Once {
        format: "text".to_string(),
        override_freeze: false,
    })
    .unwrap();
    ws.write("web/app.js", "1");
    let out = ctx
        .execute(&Commands::Once {
            format: "text".to_string(),
            override_freeze: false,
        })
        .unwrap();
    assert!(out.text.contains("released: version 0.0.1"));
}

#[test]
fn test_invalid_config_is_rejected_before_watching() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let ws = TestWorkspace::new();
    ws.write("bad.toml", "[watch]\ninterval_secs = 0\n");
    let err = RunContext::new(ws.root().to_path_buf(), Some(ws.path("bad.toml")))
        .err()
        .unwrap();
    assert!(err.to_string().contains("interval_secs"));
}

#[test]
fn test_cli_interval_override_is_validated() {
    let ws = TestWorkspace::new();
    let ctx = RunContext::with_config(ws.root().to_path_buf(), ws.config());
    let err = ctx
        .execute(&Commands::Watch {
            interval: Some(-1.0),
            cooldown: None,
            native_events: false,
            override_freeze: false,
        })
        .unwrap_err();
    assert!(err.to_string().contains("interval_secs"));
}

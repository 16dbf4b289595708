//! Integration tests for the `paddock` binary.
//!
//! Argument parsing, config handling and the gateway probe, driven against
//! temp config files and a mock gateway. No real cameras involved.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `paddock` binary with env isolation.
///
/// Points config directories at a nonexistent path and clears `PADDOCK_*`
/// overrides so tests never touch the user's real configuration.
fn paddock_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("paddock");
    cmd.env("HOME", "/tmp/paddock-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/paddock-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("PADDOCK_CONFIG")
        .env_remove("PADDOCK_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let file = dir.path().join("config.toml");
    std::fs::write(&file, body).unwrap();
    file
}

fn with_config(file: &Path) -> assert_cmd::Command {
    let mut cmd = paddock_cmd();
    cmd.arg("--config").arg(file);
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const STABLE_CAMERAS: &str = r#"
[gateway]
request_timeout = "2s"

[[cameras]]
id = "foaling-box"
host = "10.0.8.2:8554"
username = "admin"
password = "hunter2"
ptz = true
presets = [{ id = "door" }]

[[cameras]]
id = "hay-barn"
host = "10.0.8.3:8554"
enabled = false
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = paddock_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    paddock_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("monitor")
            .and(predicate::str::contains("snapshot"))
            .and(predicate::str::contains("ptz"))
            .and(predicate::str::contains("stream")),
    );
}

#[test]
fn test_version_flag() {
    paddock_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("paddock"));
}

#[test]
fn test_invalid_ptz_action() {
    let output = paddock_cmd()
        .args(["ptz", "foaling-box", "backflip"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("backflip"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    paddock_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    paddock_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("elsewhere.toml");
    with_config(&file)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere.toml"));
}

#[test]
fn test_config_show_masks_passwords() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, STABLE_CAMERAS);
    with_config(&file)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("foaling-box")
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("hunter2").not()),
        );
}

#[test]
fn test_config_show_plain_lists_ids() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, STABLE_CAMERAS);
    with_config(&file)
        .args(["--format", "plain", "config", "show"])
        .assert()
        .success()
        .stdout("foaling-box\nhay-barn\n");
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("nested").join("config.toml");

    with_config(&file).args(["config", "init"]).assert().success();
    assert!(std::fs::read_to_string(&file).unwrap().contains("[[cameras]]"));

    let output = with_config(&file).args(["config", "init"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("already exists"));

    with_config(&file)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_invalid_reconnect_strategy_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, "[reconnect]\nstrategy = \"sometimes\"\n");
    let output = with_config(&file).arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("reconnect.strategy"));
}

// ── Camera commands ─────────────────────────────────────────────────

#[test]
fn test_snapshot_unknown_camera() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, STABLE_CAMERAS);
    let output = with_config(&file)
        .args(["snapshot", "tack-room"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("tack-room"));
}

#[test]
fn test_goto_preset_without_preset_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, STABLE_CAMERAS);
    let output = with_config(&file)
        .args(["ptz", "foaling-box", "goto-preset"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--preset"));
}

#[test]
fn test_monitor_with_nothing_enabled() {
    let dir = TempDir::new().unwrap();
    let file = write_config(&dir, STABLE_CAMERAS);
    let output = with_config(&file)
        .args(["monitor", "--camera", "hay-barn"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("no enabled cameras"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_probes_each_gateway() {
    let gateway = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "running", "streams": 1 })),
        )
        .mount(&gateway)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_config(
        &dir,
        &format!(
            r#"
[gateway]
request_timeout = "2s"

[[cameras]]
id = "foaling-box"
host = "{live}"

[[cameras]]
id = "north-gate"
host = "127.0.0.1:9"

[[cameras]]
id = "hay-barn"
host = "{live}"
enabled = false
"#,
            live = gateway.address()
        ),
    );

    let output = tokio::task::spawn_blocking(move || {
        with_config(&file)
            .args(["--format", "plain", "status"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "foaling-box\trunning",
            "north-gate\tunreachable",
            "hay-barn\tdisabled",
        ]
    );
}

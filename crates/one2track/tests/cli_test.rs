//! Integration tests for the `one2track` CLI binary.
//!
//! Argument parsing, help output, completions and error handling run
//! without network access; the end-to-end tests point `--base-url` at a
//! wiremock portal.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `one2track` binary with env isolation.
///
/// Clears all `ONE2TRACK_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn one2track_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("one2track");
    cmd.env("HOME", "/tmp/one2track-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/one2track-cli-test-nonexistent")
        .env_remove("ONE2TRACK_PROFILE")
        .env_remove("ONE2TRACK_BASE_URL")
        .env_remove("ONE2TRACK_USERNAME")
        .env_remove("ONE2TRACK_PASSWORD")
        .env_remove("ONE2TRACK_ACCOUNT_ID")
        .env_remove("ONE2TRACK_OUTPUT")
        .env_remove("ONE2TRACK_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Command with credentials in the environment, aimed at a mock portal.
fn portal_cmd(server: &MockServer, account_id: Option<&str>) -> assert_cmd::Command {
    let mut cmd = one2track_cmd();
    cmd.env("ONE2TRACK_USERNAME", "kid@example.com")
        .env("ONE2TRACK_PASSWORD", "hunter2")
        .args(["--base-url", &server.uri(), "--timeout", "5"]);
    if let Some(id) = account_id {
        cmd.env("ONE2TRACK_ACCOUNT_ID", id);
    }
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a command off the async test thread so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

async fn mount_portal(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta name="csrf-token" content="abc123" /></head></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/users/42/devices")
                .insert_header("Set-Cookie", "_iadmin=sess1; path=/; HttpOnly"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/users/42/devices"))
        .mount(server)
        .await;
}

async fn mount_devices(server: &MockServer, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!([{
            "device": {
                "id": 1001,
                "uuid": "u1",
                "name": "Kid1",
                "status": "GPS",
                "last_location": {
                    "address": "Damrak 1, Amsterdam",
                    "location_type": "GPS",
                    "latitude": 52.3745,
                    "longitude": 4.8979,
                    "battery_percentage": 64
                }
            }
        }]))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("GET"))
        .and(path("/users/42/devices"))
        .respond_with(template)
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = one2track_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    one2track_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("One2Track")
            .and(predicate::str::contains("install"))
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    one2track_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("one2track"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    one2track_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    one2track_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    // Renders the defaults when no config file exists.
    one2track_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]").and(predicate::str::contains("timeout = 300")));
}

#[test]
fn test_config_show_json() {
    let output = one2track_cmd()
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["defaults"]["interval"], 60);
}

#[test]
fn test_config_path() {
    one2track_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = one2track_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let output = one2track_cmd()
        .args(["--output", "invalid", "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_watch_interval() {
    let output = one2track_cmd()
        .args(["watch", "--interval", "soon"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_devices_without_credentials() {
    let output = one2track_cmd()
        .args(["--base-url", "http://127.0.0.1:9", "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected AUTH exit code");
    let text = combined_output(&output);
    assert!(text.contains("credentials"), "{text}");
}

#[test]
fn test_unknown_profile() {
    let output = one2track_cmd()
        .args(["--profile", "ghost", "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "Expected CONFIG exit code");
    assert!(combined_output(&output).contains("ghost"));
}

#[test]
fn test_install_non_interactive_without_credentials() {
    let output = one2track_cmd()
        .args(["install", "--non-interactive", "--no-save"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ── End to end against a mock portal ────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_json_end_to_end() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    mount_devices(&server, 200).await;

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.args(["-o", "json", "devices"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["uuid"], "u1");
    assert_eq!(devices[0]["name"], "Kid1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_table_and_detail() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    mount_devices(&server, 200).await;

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.arg("devices");
    let output = run(cmd).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Kid1") && stdout.contains("64%"), "{stdout}");

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.args(["devices", "kid1"]);
    let output = run(cmd).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Damrak 1, Amsterdam"), "{stdout}");

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.args(["devices", "nobody"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(9));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_rejected_session() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    mount_devices(&server, 403).await;

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.arg("devices");
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("403"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_credentials_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<meta name="csrf-token" content="abc123" />"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.arg("devices");
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("Authentication failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_install_reports_account_id() {
    let server = MockServer::start().await;
    mount_portal(&server).await;

    let mut cmd = portal_cmd(&server, None);
    cmd.args(["-o", "plain", "install", "--no-save", "--non-interactive"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "42");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_install_saves_profile() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = portal_cmd(&server, None);
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .args(["install", "--non-interactive"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let mut cmd = one2track_cmd();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .args(["config", "show"]);
    let output = run(cmd).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("account_id = \"42\""), "{stdout}");
    assert!(stdout.contains("kid@example.com"), "{stdout}");
    assert!(!stdout.contains("hunter2"), "password from env must not be saved");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_polls_count_times() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    mount_devices(&server, 200).await;

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.args(["-o", "plain", "watch", "--interval", "10ms", "--count", "2"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().filter(|l| *l == "u1").count(), 2, "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_keeps_running_after_failed_poll() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    mount_devices(&server, 500).await;

    let mut cmd = portal_cmd(&server, Some("42"));
    cmd.args(["-o", "plain", "watch", "--interval", "10ms", "--count", "2"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("no snapshot yet").count(), 2, "{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_refuses_account_mismatch() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    mount_devices(&server, 200).await;

    let mut cmd = portal_cmd(&server, Some("7"));
    cmd.args(["watch", "--count", "1"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("mismatch"));
}

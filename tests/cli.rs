// ABOUTME: Integration tests for the hopgate CLI commands.
// ABOUTME: Exercises help, policy checks, config output, and the MCP handshake without a gateway.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const CONFIG: &str = r#"{
    "gatewayConnection": "admin@gw.example.com:2222",
    "gatewayPassword": "gw-pass",
    "allowedHosts": ["web1", "web2"],
    "allowedCommands": ["tail", "grep", "docker ps"],
    "serverInfo": {"web1": "frontend"}
}"#;

fn hopgate_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hopgate"));
    cmd.env_remove("CONFIG_FILE").env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("hopgate.json");
    fs::write(&path, CONFIG).unwrap();
    path
}

#[test]
fn help_shows_commands() {
    hopgate_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn check_accepts_allowed_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--host", "web1", "tail", "-n", "50", "app.log", "|", "grep", "ERROR"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowed"));
}

#[test]
fn check_rejects_blocked_pattern() {
    hopgate_cmd()
        .args(["check", "ls;", "rm", "-rf", "/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("command blocked: blocked pattern: ;"));
}

#[test]
fn check_rejects_unlisted_command() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .arg("-c")
        .arg(&config)
        .args(["check", "docker", "rm", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("command not allowed: docker"));
}

#[test]
fn check_rejects_unknown_host() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--host", "db9", "tail", "app.log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "host not allowed: db9 (allowed hosts: web1, web2)",
        ));
}

#[test]
fn exec_rejects_unknown_host_without_dialing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .arg("--config")
        .arg(&config)
        .args(["exec", "--host", "db9", "--user", "deploy", "tail", "app.log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("host not allowed: db9"));
}

#[test]
fn config_prints_effective_policies() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowedHosts\""))
        .stdout(predicate::str::contains("docker ps"))
        .stdout(predicate::str::contains("frontend"))
        .stdout(predicate::str::contains("gw-pass").not());
}

#[test]
fn config_file_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .env("CONFIG_FILE", &config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("web2"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    hopgate_cmd()
        .arg("--config")
        .arg(dir.path().join("missing.json"))
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn serve_speaks_mcp_on_stdio_until_eof() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    hopgate_cmd()
        .arg("--config")
        .arg(&config)
        .arg("serve")
        .write_stdin(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"cli-test","version":"0"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
        ))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""id":1"#))
        .stdout(predicate::str::contains("protocolVersion"))
        .stdout(predicate::str::contains("hopgate"))
        .stdout(predicate::str::contains(r#""tools""#));
}

#[test]
fn check_rejects_line_break() {
    hopgate_cmd()
        .args(["check", "uptime\nid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line breaks are not allowed"));
}

//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "vigil-cli", "--"])
        .args(args)
        .env("VIGIL_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_help() {
    let (stdout, _, code) = run_cli(&["--help"]);
    assert_eq!(code, 0, "Help failed");
    assert!(stdout.contains("check-in"));
}

#[test]
fn test_config_show() {
    let (stdout, _, code) = run_cli(&["config", "show"]);
    assert_eq!(code, 0, "Config show failed");
    assert!(stdout.contains("tick_interval_secs"));
}

#[test]
fn test_user_register_and_show() {
    let (stdout, _, code) = run_cli(&[
        "user",
        "register",
        "Test User",
        "--id",
        "cli-test-user",
        "--utc-offset-minutes",
        "240",
    ]);
    assert_eq!(code, 0, "User register failed");
    assert!(stdout.contains("cli-test-user"));

    let (stdout, _, code) = run_cli(&["user", "show", "cli-test-user"]);
    assert_eq!(code, 0, "User show failed");
    assert!(stdout.contains("\"utc_offset_minutes\": 240"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let (_, _, code) = run_cli(&["frobnicate"]);
    assert_ne!(code, 0, "Unknown subcommand unexpectedly succeeded");
}

#[test]
fn test_completions_generate() {
    let (stdout, _, code) = run_cli(&["completions", "bash"]);
    assert_eq!(code, 0, "Completions failed");
    assert!(stdout.contains("vigil-cli"));
}

#[test]
fn test_checkin_list_empty() {
    let (stdout, _, code) = run_cli(&["checkin", "list", "no-such-relationship"]);
    assert_eq!(code, 0, "Checkin list failed");
    assert!(serde_json::from_str::<serde_json::Value>(stdout.trim())
        .map(|v| v.as_array().map(|a| a.is_empty()).unwrap_or(false))
        .unwrap_or(false));
}

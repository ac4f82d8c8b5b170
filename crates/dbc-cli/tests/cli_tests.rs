//! Integration tests for the DBC CLI
//!
//! These tests invoke the actual dbc-cli binary and verify:
//! - Exit codes (0 = success, 1 = contract failure, 2 = error)
//! - stdout/stderr output
//! - JSON output format
//! - All commands work end-to-end

use std::path::PathBuf;
use std::process::Command;

// ── Helpers ───────────────────────────────────────────────

fn dbc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dbc-cli"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(format!("../../tests/fixtures/{}", name))
}

fn fixture_arg(name: &str) -> String {
    fixture(name).to_string_lossy().into_owned()
}

fn run_dbc(args: &[&str]) -> std::process::Output {
    Command::new(dbc_bin())
        .args(args)
        .env_remove("NODE_ENV")
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .expect("failed to execute dbc-cli")
}

// ── Version ───────────────────────────────────────────────

#[test]
fn test_version_command() {
    let output = run_dbc(&["version"]);
    assert!(output.status.success(), "version should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dbc"), "should contain 'dbc'");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "should contain version"
    );
}

#[test]
fn test_version_flag() {
    let output = run_dbc(&["--version"]);
    assert!(output.status.success(), "--version should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

// ── Lower ─────────────────────────────────────────────────

#[test]
fn test_lower_prints_guards() {
    let output = run_dbc(&["lower", &fixture_arg("precondition-no-block.js")]);
    assert!(output.status.success(), "lower should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("if (!(typeof input === 'string')) {"));
    assert!(stdout.contains("throw new Error("));
    assert!(!stdout.contains("pre:"));
}

#[test]
fn test_lower_strip_flag() {
    let output = run_dbc(&["lower", &fixture_arg("example-4.js"), "--strip"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("throw"));
    assert!(stdout.contains("fromAccount.balance -= amount;"));
}

#[test]
fn test_lower_env_strip_from_config() {
    let output = run_dbc(&[
        "lower",
        &fixture_arg("custom-names.js"),
        "--config",
        &fixture_arg("custom-names.json"),
        "--env",
        "production",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("requires:"));
    assert!(!stdout.contains("throw"));
}

#[test]
fn test_lower_node_env_fallback() {
    let output = Command::new(dbc_bin())
        .args([
            "lower",
            &fixture_arg("custom-names.js"),
            "--config",
            &fixture_arg("custom-names.json"),
        ])
        .env("NODE_ENV", "production")
        .output()
        .expect("failed to execute dbc-cli");
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("throw"));
}

#[test]
fn test_lower_output_file() {
    let out = std::env::temp_dir().join(format!("dbc-lower-{}.js", std::process::id()));
    let output = run_dbc(&[
        "lower",
        &fixture_arg("postcondition.js"),
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("const _demoPostcondition = (it) => {"));
    let _ = std::fs::remove_file(&out);
}

#[test]
fn test_lower_side_effect_exits_1() {
    let output = run_dbc(&["lower", &fixture_arg("bad-precondition-with-let.js")]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Preconditions cannot have side effects."));
}

#[test]
fn test_lower_nonexistent_file() {
    let output = run_dbc(&["lower", "/nonexistent/file.js"]);
    assert_eq!(output.status.code(), Some(2), "missing file should exit 2");
}

#[test]
fn test_lower_bad_config_exits_2() {
    let output = run_dbc(&[
        "lower",
        &fixture_arg("precondition.js"),
        "--config",
        &fixture_arg("precondition.js"),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Configuration error"));
}

// ── Check ─────────────────────────────────────────────────

#[test]
fn test_check_valid() {
    let output = run_dbc(&["check", &fixture_arg("example-3.js")]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ok"));
}

#[test]
fn test_check_invalid() {
    let output = run_dbc(&["check", &fixture_arg("bad-contradiction.js")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Contract always fails."));
}

#[test]
fn test_check_json_output() {
    let output = run_dbc(&["check", &fixture_arg("bad-precondition-with-assignment.js"), "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("should be valid JSON");
    assert_eq!(parsed["valid"], false);
    assert!(parsed["error"]
        .as_str()
        .unwrap()
        .starts_with("Preconditions cannot have side effects."));

    let output = run_dbc(&["check", &fixture_arg("example-4.js"), "--json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(parsed["valid"], true);
    assert!(parsed["error"].is_null());
}

// ── Run ───────────────────────────────────────────────────

#[test]
fn test_run_success() {
    let output = run_dbc(&[
        "run",
        &fixture_arg("old-value.js"),
        "--call",
        "default",
        "--args",
        "[5, 5]",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "10");
}

#[test]
fn test_run_violation_exits_1() {
    let output = run_dbc(&[
        "run",
        &fixture_arg("example-4.js"),
        "--call",
        "default",
        "--args",
        r#"[{"balance": 100, "overdraftLimit": 100}, 1000]"#,
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Must not exceed overdraft limit"));
}

#[test]
fn test_run_stripped_ignores_violation() {
    let output = run_dbc(&[
        "run",
        &fixture_arg("precondition.js"),
        "--call",
        "default",
        "--args",
        "[false]",
        "--strip",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "false");
}

#[test]
fn test_run_unknown_function_exits_2() {
    let output = run_dbc(&["run", &fixture_arg("precondition.js"), "--call", "missing"]);
    assert_eq!(output.status.code(), Some(2));
}

// ── All fixtures ──────────────────────────────────────────

#[test]
fn test_all_fixtures_check() {
    let dir = fixture("");
    let mut checked = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("js") {
            continue;
        }
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let output = run_dbc(&["check", path.to_str().unwrap()]);
        let expected = if name.starts_with("bad-") { 1 } else { 0 };
        assert_eq!(
            output.status.code(),
            Some(expected),
            "{} should exit {}",
            name,
            expected
        );
        checked += 1;
    }
    assert!(checked > 20, "expected the fixture directory to be populated");
}

// ── Determinism: CLI output ───────────────────────────────

#[test]
fn test_cli_lower_determinism_20_iterations() {
    let path = fixture_arg("old-value-object.js");
    let first = run_dbc(&["lower", &path]);
    assert!(first.status.success());
    for i in 0..20 {
        let output = run_dbc(&["lower", &path]);
        assert_eq!(output.stdout, first.stdout, "iteration {} differs", i);
    }
}

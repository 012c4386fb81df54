use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const LOG_VARS: &[&str] = &[
    "LOG_LEVEL",
    "LOG_FORMAT",
    "LOG_OUTPUT",
    "LOG_RUN_TIMESTAMP",
    "LOG_FILE_MAX_SIZE_MB",
    "LOG_FILE_MAX_BACKUPS",
    "WHISPERX_CONFIG_JSON",
    "WHISPERX_HF_TOKEN",
];

fn tools() -> Command {
    let mut cmd = Command::cargo_bin("briefcast-tools").unwrap();
    for var in LOG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn redact_masks_secrets_from_stdin() {
    let output = tools()
        .arg("redact")
        .write_stdin(r#"{"token": "abc", "nested": {"safe": "value", "Api-Key": "k"}, "items": [1, 2]}"#)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({
            "token": "***REDACTED***",
            "nested": {"safe": "value", "Api-Key": "***REDACTED***"},
            "items": [1, 2],
        })
    );
}

#[test]
fn redact_rejects_invalid_json_with_usage_exit() {
    let output = tools().arg("redact").write_stdin("{oops").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output), json!({"error": "invalid json input"}));
}

#[test]
fn emit_writes_redacted_json_record_to_stderr() {
    let output = tools()
        .env("LOG_FORMAT", "json")
        .args([
            "--service",
            "x",
            "emit",
            "--message",
            "hello",
            "--context",
            r#"{"api_key": "v", "safe": "ok"}"#,
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1);

    let payload: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(payload["service"], "x");
    assert_eq!(payload["message"], "hello");
    assert_eq!(payload["context"]["api_key"], "***REDACTED***");
    assert_eq!(payload["context"]["safe"], "ok");
}

#[test]
fn emit_below_threshold_is_silent() {
    tools()
        .env("LOG_LEVEL", "error")
        .args(["emit", "--level", "info", "--message", "quiet"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn emit_rejects_invalid_context() {
    tools()
        .args(["emit", "--message", "m", "--context", "not json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("invalid context json"));
}

#[test]
fn text_records_go_to_run_stamped_file() {
    let dir = TempDir::new().unwrap();
    let output = format!("file:{}/logs/tools-{{run_ts}}.log", dir.path().display());

    tools()
        .env("LOG_OUTPUT", output)
        .env("LOG_RUN_TIMESTAMP", "2024/05/01 10:00")
        .args(["emit", "--level", "warning", "--message", "feed marked as bozo"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    let log = fs_err::read_to_string(dir.path().join("logs/tools-202405011000.log")).unwrap();
    assert!(log.contains(" WARNING briefcast-shell "));
    assert!(log.trim_end().ends_with("feed marked as bozo"));
}

#[test]
fn run_timestamp_is_sanitized() {
    let output = tools()
        .env("LOG_RUN_TIMESTAMP", "2024/01/02 03:04")
        .arg("run-timestamp")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_json(&output), json!({"run_timestamp": "202401020304"}));
}

#[test]
fn whisperx_config_requires_existing_audio() {
    let output = tools()
        .args(["whisperx-config", "--no-gpu-probe", "/definitely/not/here.mp3"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output), json!({"error": "audio file not found"}));
}

#[test]
fn whisperx_config_applies_overrides() {
    let dir = TempDir::new().unwrap();
    let audio = dir.path().join("episode.mp3");
    fs_err::write(&audio, b"ID3").unwrap();

    let output = tools()
        .env("WHISPERX_CONFIG_JSON", r#"{"batch_size": 8, "asr_options": {"beam_size": 3}}"#)
        .env("WHISPERX_HF_TOKEN", "hf_secret")
        .arg("whisperx-config")
        .arg("--no-gpu-probe")
        .arg(&audio)
        .output()
        .unwrap();

    assert!(output.status.success());
    let plan = stdout_json(&output);
    assert_eq!(plan["device"], "cpu");
    assert_eq!(plan["compute_type"], "int8");
    assert_eq!(plan["batch_size"], 8);
    assert_eq!(plan["asr_options"]["beam_size"], 3);
    assert_eq!(plan["asr_options"]["patience"], 1);
    assert_eq!(plan["has_hf_token"], true);
    assert_eq!(plan["diarization"]["error"], "");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains("hf_secret"));
}

#[test]
fn config_prints_resolved_settings_as_json() {
    let output = tools()
        .env("LOG_LEVEL", "debug")
        .env("LOG_FORMAT", "json")
        .env("LOG_OUTPUT", " stderr , ")
        .env("LOG_FILE_MAX_SIZE_MB", "3")
        .arg("config")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({
            "level": "DEBUG",
            "format": "json",
            "outputs": ["stderr"],
            "rotation": {"max_bytes": 3 * 1024 * 1024, "max_backups": 7},
        })
    );
}

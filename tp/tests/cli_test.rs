//! CLI tests for the `tp` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLAN: &str = r#"{"replyText":"Hi","planDays":[[{"title":"Balboa Park","short_description":"Walk","estimated_cost":"Free"},{"title":"Visit Balboa Park","short_description":"Again"},{"title":"Zoo","short_description":"Animals","estimated_cost":"$25 to $40"}]]}"#;

/// `tp` isolated from the user's config and log directories
fn tp(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tp").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_key_strips_generic_verbs() {
    let home = TempDir::new().unwrap();
    tp(&home)
        .args(["key", "Visit Balboa Park"])
        .assert()
        .success()
        .stdout("balboa park\n");
}

#[test]
fn test_cost_normalizes_range() {
    let home = TempDir::new().unwrap();
    tp(&home)
        .args(["cost", "$25 to $40"])
        .assert()
        .success()
        .stdout("$25–$40\n");
}

#[test]
fn test_replay_json_document() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("plan.json");
    std::fs::write(&file, PLAN).unwrap();

    tp(&home)
        .args(["replay", "plan.json", "--chunk-size", "7", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"finalized\": true"))
        .stdout(predicate::str::contains("Balboa Park"))
        .stdout(predicate::str::contains("Visit Balboa Park").not());
}

#[test]
fn test_record_then_replay_transcript() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("plan.json"), PLAN).unwrap();

    let output = tp(&home).args(["record", "plan.json"]).output().unwrap();
    assert!(output.status.success());
    let transcript = String::from_utf8(output.stdout).unwrap();
    assert!(transcript.starts_with("event: token\n"));
    assert!(transcript.ends_with("data: [DONE]\n\n"));

    std::fs::write(home.path().join("turn.sse"), &transcript).unwrap();
    tp(&home)
        .args(["replay", "turn.sse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Day 1"))
        .stdout(predicate::str::contains("$25–$40"));
}

#[test]
fn test_replay_events_format() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("plan.json"), PLAN).unwrap();

    tp(&home)
        .args(["replay", "plan.json", "--format", "events"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"TurnStarted""#))
        .stdout(predicate::str::contains(r#""type":"TurnEnded""#));
}

#[test]
fn test_replay_missing_file_fails() {
    let home = TempDir::new().unwrap();
    tp(&home)
        .args(["replay", "missing.sse"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read transcript"));
}

#[test]
fn test_config_prints_effective_values() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join(".tripplan.yml"),
        "plan:\n  mode: legacy\nreorder:\n  column-penalty: 250.0\n",
    )
    .unwrap();

    tp(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("mode: legacy"))
        .stdout(predicate::str::contains("column-penalty: 250.0"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join(".tripplan.yml"),
        "plan:\n  min-items: 6\n  max-items: 2\n",
    )
    .unwrap();

    tp(&home)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

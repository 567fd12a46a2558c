use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use tinygen_core::{FileLedger, QueryLedger, RepositoryReference};

fn tinygen_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tinygen"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("OPENAI_API_KEY")
        .env_remove("TINYGEN_MODEL")
        .env_remove("TINYGEN_API_URL")
        .env_remove("TINYGEN_HISTORY_LIMIT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_every_command() {
    let home = TempDir::new().expect("home");
    tinygen_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("generate"))
        .stdout(contains("query"))
        .stdout(contains("config"))
        .stdout(contains("daemon"));
}

#[test]
fn config_init_writes_defaults_once() {
    let home = assert_fs::TempDir::new().expect("home");
    let config = home.child(".tinygen/config.yaml");

    tinygen_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("config.yaml"));
    config.assert(predicate::path::is_file());
    let written = std::fs::read_to_string(config.path()).expect("read config");
    assert!(written.contains("history_limit: 10"), "{written}");

    tinygen_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(contains("--force"));

    tinygen_cmd(home.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_show_applies_environment_overrides() {
    let home = TempDir::new().expect("home");
    tinygen_cmd(home.path())
        .env("TINYGEN_MODEL", "gpt-4.1")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("model: gpt-4.1"))
        .stdout(contains("policy: best_effort"));
}

#[test]
fn malformed_config_is_reported_with_its_path() {
    let home = assert_fs::TempDir::new().expect("home");
    home.child(".tinygen/config.yaml")
        .write_str("conversation:\n  history_limit: many\n")
        .expect("write config");
    tinygen_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(contains("config.yaml"));
}

#[test]
fn query_show_prints_a_recorded_query() {
    let home = TempDir::new().expect("home");
    let ledger = FileLedger::at(home.path());
    let query = ledger
        .create(
            &RepositoryReference::from("https://example.com/repo.git"),
            "Add null check",
        )
        .expect("create");
    ledger
        .attach_result(query.id, "--- a/x\n+++ b/x\n")
        .expect("attach");

    tinygen_cmd(home.path())
        .args(["query", "show", &query.id.to_string()])
        .assert()
        .success()
        .stdout(contains("prompt: Add null check"))
        .stdout(contains("repo_url: https://example.com/repo.git"))
        .stdout(contains("+++ b/x"));
}

#[test]
fn query_show_unknown_id_fails() {
    let home = TempDir::new().expect("home");
    tinygen_cmd(home.path())
        .args(["query", "show", "42"])
        .assert()
        .failure()
        .stderr(contains("query 42 not found"));
}

#[test]
fn generate_without_api_key_fails_at_config_stage() {
    let home = TempDir::new().expect("home");
    tinygen_cmd(home.path())
        .args(["generate", "https://example.com/repo.git", "Add null check"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(contains("config stage"))
        .stderr(contains("OPENAI_API_KEY"));

    // Nothing was recorded: the pipeline never started.
    assert!(!home.path().join(".tinygen/queries").exists());
}

#[test]
fn generate_via_daemon_requires_a_running_daemon() {
    let home = TempDir::new().expect("home");
    tinygen_cmd(home.path())
        .args([
            "generate",
            "https://example.com/repo.git",
            "Add null check",
            "--via-daemon",
        ])
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));
}

#[test]
fn daemon_status_and_stop_when_not_running() {
    let home = TempDir::new().expect("home");
    tinygen_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains(r#""running": false"#))
        .stdout(contains("daemon.sock"));

    tinygen_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

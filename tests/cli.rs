// ABOUTME: Integration tests for the command-line interface.
// ABOUTME: Runs the built binary against temporary configurations.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("keyferry")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn check_config_prints_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("keyferry")
        .unwrap()
        .arg("check-config")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("SSH port: 22"))
        .stdout(predicate::str::contains("Trust on first use: false"));
}

#[test]
fn check_config_reads_discovered_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("keyferry.yml"),
        "ssh:\n  port: 2222\n  trust_on_first_use: true\n",
    )
    .unwrap();

    Command::cargo_bin("keyferry")
        .unwrap()
        .arg("check-config")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("SSH port: 2222"))
        .stdout(predicate::str::contains("Trust on first use: true"));
}

#[test]
fn check_config_fails_on_missing_explicit_path() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("keyferry")
        .unwrap()
        .args(["check-config", "--config", "does-not-exist.yml"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn check_config_fails_on_malformed_yaml() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keyferry.yml"), "ssh: [not, a, map]\n").unwrap();

    Command::cargo_bin("keyferry")
        .unwrap()
        .arg("check-config")
        .current_dir(dir.path())
        .assert()
        .failure();
}

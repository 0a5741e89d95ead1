//! Integration tests for CLI argument handling and exit codes (§6.1).

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn help_lists_usage() {
    let mut cmd = Command::cargo_bin("creator").expect("binary exists");
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("Usage"));
}

#[test]
fn export_and_no_export_are_mutually_exclusive() {
    let dir = tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("creator").expect("binary exists");
    cmd.current_dir(dir.path())
        .args(["-u", "app", "-e", "-n"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn dry_and_export_are_mutually_exclusive() {
    let dir = tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("creator").expect("binary exists");
    cmd.current_dir(dir.path())
        .args(["-u", "app", "-d", "-e"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_unit_file_is_a_build_failure_not_cli_misuse() {
    let dir = tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("creator").expect("binary exists");
    cmd.current_dir(dir.path()).args(["-u", "nonexistent"]).assert().failure().code(1);
}

#[test]
fn ambiguous_main_unit_without_explicit_flag_is_cli_misuse() {
    let dir = tempdir().expect("temp dir");
    std::fs::write(dir.path().join("a.crunit"), "").expect("write fixture a");
    std::fs::write(dir.path().join("b.crunit"), "").expect("write fixture b");
    let mut cmd = Command::cargo_bin("creator").expect("binary exists");
    cmd.current_dir(dir.path()).assert().failure().code(2);
}

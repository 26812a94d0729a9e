//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `thrd` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! Each test builds its workspace in a temporary directory and runs the
//! binary from there, so the default `--root .` picks it up.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const POINT: &str = "#dict{\n    x: #int\n    y: #int\n}\n";

fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (name, text) in files {
        fs::write(dir.path().join(name), text).expect("write fixture");
    }
    dir
}

/// Helper: create a Command for the `thrd` binary, rooted at `dir`.
fn thrd(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("thrd");
    cmd.current_dir(dir.path());
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = workspace(&[]);
    thrd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("THRD data language toolchain"));
}

#[test]
fn version_exits_0() {
    let dir = workspace(&[]);
    thrd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("thrd"));
}

// ──────────────────────────────────────────────
// 2. Check
// ──────────────────────────────────────────────

#[test]
fn check_clean_workspace_exits_0() {
    let dir = workspace(&[
        ("Point.thrdtype", POINT),
        ("origin.Point.thrd", "{x: 0, y: 0}\n"),
    ]);
    thrd(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "2 file(s) checked: 0 error(s), 0 warning(s)",
        ));
}

#[test]
fn check_reports_type_errors_and_exits_1() {
    let dir = workspace(&[("Point.thrdtype", POINT), ("bad.Point.thrd", "{x: 1}\n")]);
    thrd(&dir)
        .args(["check", "bad.Point.thrd"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "bad.Point.thrd:1:1: error: Missing property \"y\". [missing-property]",
        ));
}

#[test]
fn check_warnings_alone_exit_0() {
    let dir = workspace(&[
        ("Point.thrdtype", POINT),
        ("p.Point.thrd", "{x: 1, y: 2}   \n"),
    ]);
    thrd(&dir)
        .args(["check", "p.Point.thrd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[trailing-whitespace]"))
        .stdout(predicate::str::contains("0 error(s), 1 warning(s)"));
}

#[test]
fn check_json_output_lists_diagnostics() {
    let dir = workspace(&[("Point.thrdtype", POINT), ("bad.Point.thrd", "{x: 1}\n")]);
    let out = thrd(&dir)
        .args(["--output", "json", "check", "bad.Point.thrd"])
        .output()
        .expect("run thrd");
    assert_eq!(out.status.code(), Some(1));
    let reports: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json stdout");
    let diagnostics = &reports[0]["diagnostics"];
    assert_eq!(diagnostics[0]["kind"], "missing-property");
    assert_eq!(diagnostics[0]["severity"], "error");
}

#[test]
fn check_missing_type_is_a_resolution_error() {
    let dir = workspace(&[("a.Nowhere.thrd", "1\n")]);
    thrd(&dir)
        .args(["check", "a.Nowhere.thrd"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[type-resolution]"))
        .stdout(predicate::str::contains("Nowhere"));
}

#[test]
fn check_explicit_root() {
    let dir = workspace(&[]);
    fs::create_dir(dir.path().join("types")).expect("mkdir");
    fs::write(dir.path().join("types/Point.thrdtype"), POINT).expect("write");
    fs::write(dir.path().join("types/o.Point.thrd"), "{x: 0, y: 0}\n").expect("write");
    thrd(&dir)
        .args(["check", "--root", "types"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 file(s) checked"));
}

#[test]
fn malformed_settings_fail() {
    let dir = workspace(&[("thrd.toml", "max_number_of_problems = \"many\"\n")]);
    thrd(&dir)
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("thrd.toml"));
}

#[test]
fn settings_can_disable_the_lint() {
    let dir = workspace(&[
        ("thrd.toml", "[lint]\nwhitespace = false\n"),
        ("Point.thrdtype", POINT),
        ("p.Point.thrd", "{x: 1, y: 2}   \n"),
    ]);
    thrd(&dir)
        .args(["check", "p.Point.thrd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 error(s), 0 warning(s)"));
}

// ──────────────────────────────────────────────
// 3. Fix
// ──────────────────────────────────────────────

#[test]
fn fix_prints_fixed_text() {
    let dir = workspace(&[
        ("Point.thrdtype", POINT),
        ("p.Point.thrd", "{x: 1, y: 2}   \n"),
    ]);
    thrd(&dir)
        .args(["fix", "p.Point.thrd"])
        .assert()
        .success()
        .stdout("{x: 1, y: 2}\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("p.Point.thrd")).expect("read"),
        "{x: 1, y: 2}   \n",
        "without --write the file is untouched"
    );
}

#[test]
fn fix_write_rewrites_the_file() {
    let dir = workspace(&[
        ("Point.thrdtype", POINT),
        ("p.Point.thrd", "{x: 1, y: 2}   \n"),
    ]);
    thrd(&dir)
        .args(["fix", "--write", "p.Point.thrd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fixed 1 issue(s)"));
    assert_eq!(
        fs::read_to_string(dir.path().join("p.Point.thrd")).expect("read"),
        "{x: 1, y: 2}\n"
    );
}

// ──────────────────────────────────────────────
// 4. Debug views
// ──────────────────────────────────────────────

#[test]
fn dump_prints_the_value_as_json() {
    let dir = workspace(&[("p.Point.thrd", "{x: 1, y: #Some[2]}\n")]);
    let out = thrd(&dir)
        .args(["dump", "p.Point.thrd"])
        .output()
        .expect("run thrd");
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json stdout");
    assert_eq!(value["dict"]["x"]["int"], 1);
    assert_eq!(value["dict"]["y"]["enum"]["tag"], "Some");
}

#[test]
fn dump_of_broken_document_fails() {
    let dir = workspace(&[("p.Point.thrd", "[ (1, 2 ]\n")]);
    thrd(&dir)
        .args(["dump", "p.Point.thrd"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[bracket-mismatch]"));
}

#[test]
fn tokens_and_chunks_are_listed() {
    let dir = workspace(&[("p.Point.thrd", "{x: 1}\n")]);
    thrd(&dir)
        .args(["tokens", "p.Point.thrd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PropertyKey"))
        .stdout(predicate::str::contains("Newline"));
    thrd(&dir)
        .args(["chunks", "p.Point.thrd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("block"))
        .stdout(predicate::str::contains("key"));
}

#[test]
fn missing_file_is_reported() {
    let dir = workspace(&[]);
    thrd(&dir)
        .args(["tokens", "nope.thrd"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.thrd"));
}

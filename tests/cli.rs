use assert_cmd::prelude::*;
use predicates::prelude::predicate;
use std::fs;
use std::process::Command;

const SAMPLE: &str = "\
blob
mark :1
data 3
foo
commit refs/heads/master
mark :2
committer U <u@x> 100 +0000
data 1
A
M 100644 :1 a
commit refs/heads/master
mark :3
from :2
committer U <u@x> 200 +0000
data 1
B
M 100644 :1 b
";

#[test]
fn convert_round_trips_a_fast_import_stream() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.fi");
    let output = dir.path().join("out.fi");
    fs::write(&input, SAMPLE).unwrap();

    Command::cargo_bin("gitsurgeon")
        .unwrap()
        .args(["convert", input.to_str().unwrap(), "--from", "fast-import", "--to"])
        .arg(&output)
        .assert()
        .success();

    let out = fs::read_to_string(&output).unwrap();
    assert!(out.contains("commit refs/heads/master"));
    assert!(out.contains("M 100644 :1 a"));
}

#[test]
fn select_prints_matching_event_indices() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.fi");
    fs::write(&input, SAMPLE).unwrap();

    Command::cargo_bin("gitsurgeon")
        .unwrap()
        .args(["select", input.to_str().unwrap(), "--from", "fast-import", "--select", "=C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1\n"))
        .stdout(predicate::str::contains("2\n"));
}

#[test]
fn apply_squash_pushes_fileops_forward() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.fi");
    let output = dir.path().join("out.fi");
    fs::write(&input, SAMPLE).unwrap();

    Command::cargo_bin("gitsurgeon")
        .unwrap()
        .args([
            "apply",
            input.to_str().unwrap(),
            "--from",
            "fast-import",
            "--select",
            ":2",
            "--op",
            "squash",
            "--to",
        ])
        .arg(&output)
        .assert()
        .success();

    let out = fs::read_to_string(&output).unwrap();
    assert_eq!(out.matches("commit refs/heads/master").count(), 1);
    assert!(out.contains("deleteall"));
    assert!(out.contains("M 100644 :1 a"));
    assert!(out.contains("M 100644 :1 b"));
}

#[test]
fn apply_expunge_without_pattern_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.fi");
    let output = dir.path().join("out.fi");
    fs::write(&input, SAMPLE).unwrap();

    Command::cargo_bin("gitsurgeon")
        .unwrap()
        .args([
            "apply",
            input.to_str().unwrap(),
            "--from",
            "fast-import",
            "--select",
            ":2",
            "--op",
            "expunge",
            "--to",
        ])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pattern"));
}

//! End-to-end tests for the arbor binary.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn arbor(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("arbor").unwrap();
    cmd.current_dir(dir.path()).env_remove("ARBOR_LOG");
    cmd
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    arbor(&dir).arg("init").assert().success();
    dir
}

fn commit_file(dir: &TempDir, path: &str, content: &str, message: &str) {
    dir.child(path).write_str(content).unwrap();
    arbor(dir).args(["add", path]).assert().success();
    arbor(dir).args(["commit", "-m", message]).assert().success();
}

#[test]
fn init_creates_repository() {
    let dir = init_repo();
    dir.child(".arbor/HEAD").assert(predicate::path::is_file());
    dir.child(".arbor/refs/heads/master")
        .assert(predicate::path::is_file());

    arbor(&dir)
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn commands_outside_repository_fail() {
    let dir = TempDir::new().unwrap();
    arbor(&dir)
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not an arbor repository"));
}

#[test]
fn commit_and_log() {
    let dir = init_repo();
    commit_file(&dir, "f.txt", "hi", "add f");

    arbor(&dir)
        .args(["log", "--format", "brief"])
        .assert()
        .success()
        .stdout(predicate::str::contains("add f").and(predicate::str::contains("initial commit")));

    arbor(&dir)
        .args(["commit", "-m", "again"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("no changes"));
}

#[test]
fn status_sections() {
    let dir = init_repo();
    commit_file(&dir, "tracked.txt", "v1", "base");
    dir.child("tracked.txt").write_str("v2").unwrap();
    dir.child("new.txt").write_str("n").unwrap();

    arbor(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("*master")
                .and(predicate::str::contains("tracked.txt (modified)"))
                .and(predicate::str::contains("=== Untracked Files ===\nnew.txt")),
        );

    let output = arbor(&dir)
        .args(["status", "--format", "json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["untracked"][0], "new.txt");
    assert_eq!(json["head"]["target"], "master");
}

#[test]
fn rm_untracked_fails() {
    let dir = init_repo();
    dir.child("loose.txt").write_str("x").unwrap();
    arbor(&dir).args(["rm", "loose.txt"]).assert().code(4);
}

#[test]
fn branch_checkout_and_merge_conflict() {
    let dir = init_repo();
    commit_file(&dir, "f.txt", "hi\n", "B");
    arbor(&dir).args(["branch", "feat"]).assert().success();
    arbor(&dir).args(["checkout", "feat"]).assert().success();
    commit_file(&dir, "f.txt", "bye\n", "C");
    arbor(&dir).args(["checkout", "master"]).assert().success();
    dir.child("f.txt").assert("hi\n");
    commit_file(&dir, "f.txt", "hello\n", "D");

    arbor(&dir)
        .args(["merge", "feat"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("merge conflict"));
    dir.child("f.txt")
        .assert("<<<<<<< HEAD\nhello\n=======\nbye\n>>>>>>>\n");

    arbor(&dir)
        .args(["checkout", "feat"])
        .assert()
        .code(8);

    dir.child("f.txt").write_str("resolved\n").unwrap();
    arbor(&dir).args(["add", "f.txt"]).assert().success();
    arbor(&dir).args(["commit", "-m", "resolve"]).assert().success();

    arbor(&dir)
        .args(["log", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merge:"));
}

#[test]
fn merge_fast_forward_and_self_merge() {
    let dir = init_repo();
    arbor(&dir).args(["branch", "feat"]).assert().success();
    arbor(&dir).args(["checkout", "feat"]).assert().success();
    commit_file(&dir, "f.txt", "feat", "C");
    arbor(&dir).args(["checkout", "master"]).assert().success();

    let output = arbor(&dir)
        .args(["merge", "feat", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "fast-forward");
    dir.child("f.txt").assert("feat");

    arbor(&dir)
        .args(["merge", "master"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("itself"));
}

#[test]
fn merge_abort_restores_files() {
    let dir = init_repo();
    commit_file(&dir, "f.txt", "hi\n", "B");
    arbor(&dir).args(["branch", "feat"]).assert().success();
    arbor(&dir).args(["checkout", "feat"]).assert().success();
    commit_file(&dir, "f.txt", "bye\n", "C");
    arbor(&dir).args(["checkout", "master"]).assert().success();
    commit_file(&dir, "f.txt", "hello\n", "D");

    arbor(&dir).args(["merge", "feat"]).assert().code(1);
    arbor(&dir).args(["merge", "--abort"]).assert().success();
    dir.child("f.txt").assert("hello\n");
    dir.child(".arbor/MERGE_HEAD")
        .assert(predicate::path::missing());
}

#[test]
fn checkout_file_and_detached_head() {
    let dir = init_repo();
    commit_file(&dir, "f.txt", "one", "first");
    let output = arbor(&dir)
        .args(["log", "--format", "json"])
        .output()
        .unwrap();
    let log: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let first = log[0]["id"].as_str().unwrap().to_string();
    commit_file(&dir, "f.txt", "two", "second");

    arbor(&dir)
        .args(["checkout", "--file", "f.txt", "--commit", &first[..8]])
        .assert()
        .success();
    dir.child("f.txt").assert("one");

    arbor(&dir)
        .args(["checkout", "--file", "missing.txt"])
        .assert()
        .code(3);

    arbor(&dir)
        .args(["checkout", "--detach", &first[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("detached"));
}

#[test]
fn find_and_delete_branch() {
    let dir = init_repo();
    commit_file(&dir, "f.txt", "x", "needle");

    arbor(&dir)
        .args(["find", "needle"])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^[0-9a-f]{64}\n$").unwrap());
    arbor(&dir).args(["find", "haystack"]).assert().code(3);

    arbor(&dir).args(["branch", "old"]).assert().success();
    arbor(&dir).args(["branch", "-d", "old"]).assert().success();
    arbor(&dir)
        .args(["branch", "-d", "master"])
        .assert()
        .code(6);
}

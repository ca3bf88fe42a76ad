// Drives the compiled binary's headless --action mode against a temp database.

use assert_cmd::Command;
use std::path::Path;
use tempfile::tempdir;

fn gymtrack(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    Command::cargo_bin("gymtrack")
        .unwrap()
        .arg("--store")
        .arg(dir.join("sessions.db"))
        .arg("--config")
        .arg(dir.join("config.json"))
        .args(["--log-level", "off"])
        .args(args)
        .assert()
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[test]
fn cli_lifecycle_persists_between_invocations() {
    let dir = tempdir().unwrap();

    let out = stdout_of(gymtrack(dir.path(), &["-t", "42", "--action", "status"]).success());
    assert_eq!(out.trim(), "not_started 0s");

    let out = stdout_of(gymtrack(dir.path(), &["-t", "42", "--action", "start"]).success());
    assert!(out.starts_with("in_progress "), "got {out}");

    let out = stdout_of(gymtrack(dir.path(), &["-t", "42", "--action", "pause"]).success());
    assert!(out.starts_with("paused "), "got {out}");

    let out = stdout_of(gymtrack(dir.path(), &["-t", "42", "--action", "status"]).success());
    assert!(out.starts_with("paused "), "got {out}");

    let out = stdout_of(gymtrack(dir.path(), &["-t", "42", "--action", "reset"]).success());
    assert_eq!(out.trim(), "not_started 0s");
}

#[test]
fn cli_ignored_transition_keeps_state() {
    let dir = tempdir().unwrap();
    let out = stdout_of(gymtrack(dir.path(), &["-t", "7", "--action", "resume"]).success());
    assert_eq!(out.trim(), "not_started 0s");
}

#[test]
fn cli_list_shows_tracked_trainings() {
    let dir = tempdir().unwrap();
    gymtrack(dir.path(), &["-t", "a", "--action", "start"]).success();
    gymtrack(dir.path(), &["-t", "b", "--action", "start"]).success();
    gymtrack(dir.path(), &["-t", "b", "--action", "complete"]).success();

    let out = stdout_of(gymtrack(dir.path(), &["--action", "list"]).success());
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a in_progress "));
    assert!(lines[1].starts_with("b completed "));
}

#[test]
fn cli_takes_training_id_from_plan() {
    let dir = tempdir().unwrap();
    let plan = dir.path().join("plan.json");
    std::fs::write(&plan, r#"{ "id": 314, "name": "Cardio", "exercises": [] }"#).unwrap();

    gymtrack(
        dir.path(),
        &["--plan", plan.to_str().unwrap(), "--action", "start"],
    )
    .success();
    let out = stdout_of(gymtrack(dir.path(), &["--action", "list"]).success());
    assert!(out.starts_with("314 in_progress "), "got {out}");
}

#[test]
fn cli_requires_a_training() {
    let dir = tempdir().unwrap();
    gymtrack(dir.path(), &["--action", "status"]).failure();
}

#[test]
fn cli_reports_rejected_plan() {
    let dir = tempdir().unwrap();
    let plan = dir.path().join("plan.json");
    std::fs::write(
        &plan,
        r#"{ "status": 403, "data": null, "message": "not your client" }"#,
    )
    .unwrap();

    let assert = gymtrack(dir.path(), &["--plan", plan.to_str().unwrap(), "--action", "status"])
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("not your client"), "got {stderr}");
}

//! CLI integration tests using assert_cmd.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examkit(home: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("examkit").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("EXAMKIT_BASE_URL")
        .env_remove("EXAMKIT_API_TOKEN");
    cmd
}

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn submission_files(dir: &std::path::Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

#[test]
fn validate_valid_exam() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .arg("validate")
        .arg("--exam")
        .arg(fixtures().join("exams/quiz.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Fixture quiz (3 questions, 15 min)"))
        .stdout(predicate::str::contains("All exams valid"));
}

#[test]
fn validate_directory() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .arg("validate")
        .arg("--exam")
        .arg(fixtures().join("exams"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Fixture quiz"))
        .stdout(predicate::str::contains("Mental math"));
}

#[test]
fn validate_reports_warnings() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .arg("validate")
        .arg("--exam")
        .arg(fixtures().join("invalid"))
        .assert()
        .success()
        .stdout(predicate::str::contains("exam duration is zero minutes"))
        .stdout(predicate::str::contains("[Q1] WARNING: question has only one option"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .arg("validate")
        .arg("--exam")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn take_and_submit_from_stdin() {
    let home = TempDir::new().unwrap();
    let results = home.path().join("results");

    examkit(&home)
        .args(["take", "quiz", "--student", "s-17", "--exam-dir"])
        .arg(fixtures().join("exams"))
        .arg("--results")
        .arg(&results)
        .write_stdin("a 2\nn\na 1\nf\ns\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fixture quiz (Geography, 6B)"))
        .stdout(predicate::str::contains("Exam submitted."))
        .stdout(predicate::str::contains("submitted by student"))
        .stdout(predicate::str::contains("2/3"));

    let files = submission_files(&results);
    assert_eq!(files.len(), 1);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(json["reason"], "manual");
    assert_eq!(json["payload"]["answers"]["1"], 12);
    assert_eq!(json["payload"]["answers"]["2"], 21);
    assert_eq!(json["flagged"], serde_json::json!([2]));

    // Cached progress is removed on submit.
    assert!(!home.path().join(".examkit/cache/exam_cache_quiz.json").exists());
}

#[test]
fn closing_stdin_submits() {
    let home = TempDir::new().unwrap();
    let results = home.path().join("results");

    examkit(&home)
        .args(["take", "mental-math", "--student", "s-17", "--relaxed", "--exam-dir"])
        .arg(fixtures().join("exams"))
        .arg("--results")
        .arg(&results)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("input closed"))
        .stdout(predicate::str::contains("0/1"));

    assert_eq!(submission_files(&results).len(), 1);
}

#[test]
fn take_unknown_exam_fails() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .args(["take", "missing", "--student", "s-17", "--exam-dir"])
        .arg(fixtures().join("exams"))
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("exam not found: missing"));
}

#[test]
fn take_requires_student_id() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .args(["take", "quiz", "--exam-dir"])
        .arg(fixtures().join("exams"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no student id"));
}

#[test]
fn cached_progress_is_restored_and_shown() {
    let home = TempDir::new().unwrap();
    let cache_dir = home.path().join(".examkit/cache");
    std::fs::create_dir_all(&cache_dir).unwrap();
    std::fs::write(
        cache_dir.join("exam_cache_quiz.json"),
        r#"{"examId":"quiz","answers":{"3":1},"flagged":[],"currentQuestionIndex":2,"timeLeftSeconds":95,"savedAt":1700000000000}"#,
    )
    .unwrap();

    examkit(&home)
        .args(["cache", "show", "quiz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Time left"))
        .stdout(predicate::str::contains("01:35"));

    examkit(&home)
        .args(["take", "quiz", "--student", "s-17", "--exam-dir"])
        .arg(fixtures().join("exams"))
        .arg("--results")
        .arg(home.path().join("results"))
        .write_stdin("s\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[3/3]"))
        .stdout(predicate::str::contains("1/3"))
        .stderr(predicate::str::contains("Progress restored (1 answered)"));

    examkit(&home)
        .args(["cache", "show", "quiz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached progress for exam quiz"));
}

#[test]
fn cache_clear_removes_snapshot() {
    let home = TempDir::new().unwrap();
    let cache_dir = home.path().join(".examkit/cache");
    std::fs::create_dir_all(&cache_dir).unwrap();
    let file = cache_dir.join("exam_cache_quiz.json");
    std::fs::write(
        &file,
        r#"{"examId":"quiz","answers":{},"flagged":[],"currentQuestionIndex":0,"timeLeftSeconds":60,"savedAt":1700000000000}"#,
    )
    .unwrap();

    examkit(&home)
        .args(["cache", "clear", "quiz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared cached progress for exam quiz"));
    assert!(!file.exists());
}

#[test]
fn cache_clear_reports_removal_failure() {
    let home = TempDir::new().unwrap();
    // A directory in the snapshot's place cannot be removed as a file.
    let blocker = home.path().join(".examkit/cache/exam_cache_quiz.json");
    std::fs::create_dir_all(blocker.join("inner")).unwrap();

    examkit(&home)
        .args(["cache", "clear", "quiz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to clear cached progress for exam quiz"))
        .stdout(predicate::str::contains("Cleared").not());
    assert!(blocker.exists());
}

#[test]
fn init_creates_files() {
    let home = TempDir::new().unwrap();

    examkit(&home)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examkit.toml"))
        .stdout(predicate::str::contains("Created exams/example.toml"));

    assert!(home.path().join("examkit.toml").exists());

    examkit(&home)
        .args(["validate", "--exam", "exams/example.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All exams valid"));
}

#[test]
fn init_skips_existing() {
    let home = TempDir::new().unwrap();

    examkit(&home).arg("init").assert().success();
    examkit(&home)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn help_output() {
    let home = TempDir::new().unwrap();
    examkit(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Timed, monitored exam sessions"));
}

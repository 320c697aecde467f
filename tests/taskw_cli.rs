use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const TASK_UUID_SLEEP: &str = "0189becf-a28b-497e-bd67-d04fa1ee3fa8";

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn fake_task_bin() -> PathBuf {
    let path = fixtures_dir().join("bin").join("task");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake task");
    }
    path
}

fn setup() -> TempDir {
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("taskrc"), "uda.estimate.type=numeric\n").expect("write taskrc");
    fs::copy(
        fixtures_dir().join("pending.jsonl"),
        temp.path().join("tasks.jsonl"),
    )
    .expect("copy fixture store");
    temp
}

fn run_taskw(temp: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskw"))
        .arg("--task-bin")
        .arg(fake_task_bin())
        .arg("--taskrc")
        .arg(temp.path().join("taskrc"))
        .args(args)
        // Keep the user's ~/.config/taskw.yml out of the picture.
        .env("HOME", temp.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("run taskw")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "expected success, got {:?}; stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn list_prints_tasks_as_json() {
    let temp = setup();
    let output = run_taskw(&temp, &["list", "+alarm"]);
    let tasks: serde_json::Value = serde_json::from_str(&stdout_of(&output)).expect("json");
    let tasks = tasks.as_array().expect("array");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["description"], "Wake up");
    assert_eq!(tasks[0]["due"], serde_json::Value::Null);
}

#[test]
fn excluded_tag_filter_needs_no_separator() {
    let temp = setup();
    let tasks: serde_json::Value =
        serde_json::from_str(&stdout_of(&run_taskw(&temp, &["list", "-alarm"]))).expect("json");
    let tasks = tasks.as_array().expect("array");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["description"], "Sleep");
}

#[test]
fn count_and_field_filters() {
    let temp = setup();
    assert_eq!(stdout_of(&run_taskw(&temp, &["count"])).trim(), "2");
    assert_eq!(
        stdout_of(&run_taskw(&temp, &["count", "description__contains=sleep"])).trim(),
        "1"
    );
}

#[test]
fn add_then_get_by_tag() {
    let temp = setup();
    let uuid = stdout_of(&run_taskw(
        &temp,
        &["add", "Brush teeth", "--tag", "morning", "--due", "2030-03-02"],
    ));
    let uuid = uuid.trim();
    assert_eq!(uuid.len(), 36, "expected a uuid, got {uuid:?}");

    let task: serde_json::Value =
        serde_json::from_str(&stdout_of(&run_taskw(&temp, &["get", "+morning"]))).expect("json");
    assert_eq!(task["uuid"], uuid);
    assert_eq!(task["description"], "Brush teeth");
    assert_eq!(task["due"], "20300302T000000Z");
    assert_eq!(stdout_of(&run_taskw(&temp, &["count"])).trim(), "3");
}

#[test]
fn delete_marks_the_task_deleted() {
    let temp = setup();
    stdout_of(&run_taskw(&temp, &["delete", TASK_UUID_SLEEP]));
    assert_eq!(
        stdout_of(&run_taskw(&temp, &["count", "status:deleted"])).trim(),
        "1"
    );
}

#[test]
fn get_with_several_matches_fails() {
    let temp = setup();
    let output = run_taskw(&temp, &["get"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("more than one task"), "got: {stderr:?}");
}

#[test]
fn task_failure_exit_code_and_stderr_are_passed_through() {
    let temp = setup();
    let output = run_taskw(&temp, &["list", "bogus"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unrecognized filter term 'bogus'"),
        "got: {stderr:?}"
    );
}

#[test]
fn invalid_uuid_is_a_usage_error() {
    let temp = setup();
    let output = run_taskw(&temp, &["delete", "not-a-uuid"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid uuid"), "got: {stderr:?}");
}

#[test]
fn missing_explicit_config_fails() {
    let temp = setup();
    let missing = temp.path().join("missing.yml");
    let output = run_taskw(&temp, &["--config", missing.to_str().expect("utf8"), "count"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Missing config file"), "got: {stderr:?}");
}

#[test]
fn udas_are_listed_from_the_taskrc() {
    let temp = setup();
    let udas: serde_json::Value =
        serde_json::from_str(&stdout_of(&run_taskw(&temp, &["udas"]))).expect("json");
    assert_eq!(udas[0]["name"], "estimate");
    assert_eq!(udas[0]["label"], "estimate");
}

#![allow(clippy::single_match_else, clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use ulid::Ulid;

fn daybook_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_daybook"))
}

fn temp_db(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("daybook-contract-{label}-{}.sqlite3", Ulid::new()))
}

fn cleanup(db_path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = db_path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(file));
    }
    let _ = std::fs::remove_file(db_path.with_extension("snapshot.json"));
}

fn daybook_output(db_path: &Path, now: &str, args: &[&str]) -> Output {
    let mut command = Command::new(daybook_binary_path());
    command
        .arg("--db")
        .arg(db_path)
        .arg("--now")
        .arg(now)
        .env("DAYBOOK_LOG", "off");
    for arg in args {
        command.arg(arg);
    }

    match command.output() {
        Ok(output) => output,
        Err(err) => panic!("failed to run daybook command {:?}: {err}", args),
    }
}

fn stdout_json(output: &Output) -> Value {
    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) => value,
        Err(err) => panic!(
            "failed to parse stdout as JSON: {err}\nstdout={}\nstderr={}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

fn run_json(db_path: &Path, now: &str, args: &[&str]) -> Value {
    let output = daybook_output(db_path, now, args);
    assert!(
        output.status.success(),
        "command {:?} failed: stderr={}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    stdout_json(&output)
}

#[test]
fn help_lists_expected_subcommands() {
    let output = match Command::new(daybook_binary_path()).arg("--help").output() {
        Ok(value) => value,
        Err(err) => panic!("failed to run help command: {err}"),
    };

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for required in [
        "task", "habit", "rollover", "history", "settings", "events", "snapshot",
    ] {
        assert!(
            stdout.contains(required),
            "expected help output to contain subcommand {required}; output={stdout}"
        );
    }
}

#[test]
fn task_json_contract_is_stable() {
    let db_path = temp_db("task");
    let created = run_json(
        &db_path,
        "2024-06-01T09:00:00Z",
        &["task", "add", "--title", "Renew passport", "--due", "2024-06-10", "--today"],
    );

    let object = match created.as_object() {
        Some(value) => value,
        None => panic!("expected task object, got {created}"),
    };
    for key in [
        "id",
        "title",
        "notes",
        "due_date",
        "scheduled_for",
        "status",
        "depends_on",
        "created_at",
        "updated_at",
        "completed_at",
        "completed_on",
    ] {
        assert!(object.contains_key(key), "task JSON missing {key}: {created}");
    }
    assert_eq!(created["due_date"], "2024-06-10");
    assert_eq!(created["created_at"], "2024-06-01T09:00:00Z");

    cleanup(&db_path);
}

#[test]
fn list_commands_print_tables_without_json_flag() {
    let db_path = temp_db("table");
    run_json(
        &db_path,
        "2024-06-01T09:00:00Z",
        &["task", "add", "--title", "Water plants", "--today"],
    );

    let output = daybook_output(&db_path, "2024-06-01T09:00:00Z", &["task", "list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("task_id"), "unexpected table output: {stdout}");
    assert!(stdout.contains("Water plants"));

    let listed = run_json(&db_path, "2024-06-01T09:00:00Z", &["--json", "task", "list"]);
    assert_eq!(listed[0]["title"], "Water plants");

    cleanup(&db_path);
}

#[test]
fn catch_up_after_absence_is_visible_across_processes() {
    let db_path = temp_db("catchup");
    let habit = run_json(
        &db_path,
        "2024-06-01T09:00:00Z",
        &["habit", "add", "--title", "Meditate"],
    );
    let habit_id = match habit["id"].as_str() {
        Some(value) => value.to_string(),
        None => panic!("habit JSON missing id: {habit}"),
    };
    run_json(
        &db_path,
        "2024-06-01T09:00:00Z",
        &["habit", "toggle", "--habit-id", &habit_id],
    );

    let status = run_json(&db_path, "2024-06-04T09:00:00Z", &["rollover", "status"]);
    assert_eq!(status["cursor"], "2024-06-04");

    let month = run_json(
        &db_path,
        "2024-06-04T09:00:00Z",
        &["--json", "history", "month", "--year", "2024", "--month", "6"],
    );
    let perfect: Vec<bool> = month
        .as_array()
        .map(|days| days.iter().filter_map(|day| day["perfect_day"].as_bool()).collect())
        .unwrap_or_default();
    assert_eq!(perfect, vec![true, false, false]);

    cleanup(&db_path);
}

#[test]
fn validation_error_exits_nonzero_with_message() {
    let db_path = temp_db("error");
    let output = daybook_output(
        &db_path,
        "2024-06-01T09:00:00Z",
        &["habit", "toggle", "--habit-id", &Ulid::new().to_string()],
    );
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("not found"),
        "expected not-found error, got stderr={stderr}"
    );

    cleanup(&db_path);
}

//! End-to-end tests of the `shiftplan` binary
//!
//! ## Exit Code Contract
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Solved, no errors (warnings allowed) |
//! | 1 | Rejected input, infeasible, timed out, or a warning under --strict |

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn shiftplan(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shiftplan"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute shiftplan")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("non-UTF-8 temp path")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// solve
// =============================================================================

#[test]
fn solve_prints_calendar_and_exits_0() {
    let poll = fixture("lab_poll.json");
    let output = shiftplan(&["solve", path_arg(&poll)]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("Lab shifts (balanced)"));
    assert!(text.contains("08:00"));
    assert!(!text.contains("Unassigned shifts"));
    assert!(text.contains("Objective: 0"));
}

#[test]
fn bounds_file_name_replaces_poll_title() {
    let poll = fixture("lab_poll.json");
    let bounds = fixture("lab_bounds.toml");
    let output = shiftplan(&["solve", path_arg(&poll), "-b", path_arg(&bounds)]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("March lab rota (balanced)"));
}

#[test]
fn json_report_for_single_variant() {
    let poll = fixture("lab_poll.json");
    let output = shiftplan(&["solve", path_arg(&poll), "--format", "json"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["variant"], "balanced");
    assert_eq!(report["status"], "solved");
    assert_eq!(report["objective"], 0);
    assert_eq!(report["proven_optimal"], true);
    assert_eq!(report["loads"].as_array().unwrap().len(), 3);
    assert!(report["calendar"]["days"].is_array());
    assert!(report["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["code"] == "S003"));
}

#[test]
fn json_report_for_both_variants_is_an_array() {
    let poll = fixture("lab_poll.json");
    let output = shiftplan(&[
        "solve",
        path_arg(&poll),
        "--variant",
        "both",
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let reports: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let variants: Vec<&str> = reports
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["variant"].as_str().unwrap())
        .collect();
    assert_eq!(variants, vec!["balanced", "minimize-trips"]);
}

#[test]
fn both_variants_write_suffixed_files() {
    let dir = tempfile::tempdir().unwrap();
    let poll = fixture("lab_poll.json");
    let out = dir.path().join("plan.txt");
    let xlsx = dir.path().join("plan.xlsx");

    let output = shiftplan(&[
        "solve",
        path_arg(&poll),
        "--variant",
        "both",
        "-o",
        path_arg(&out),
        "--xlsx",
        path_arg(&xlsx),
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    for variant in ["balanced", "minimize-trips"] {
        let text = std::fs::read_to_string(dir.path().join(format!("plan-{variant}.txt"))).unwrap();
        assert!(text.starts_with(&format!("Lab shifts ({variant})")));

        let bytes = std::fs::read(dir.path().join(format!("plan-{variant}.xlsx"))).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }
    assert!(!out.exists());
    assert!(!xlsx.exists());
}

#[test]
fn infeasible_bounds_exit_1() {
    let poll = fixture("lab_poll.json");
    let bounds = fixture("infeasible.toml");
    let output = shiftplan(&["solve", path_arg(&poll), "-b", path_arg(&bounds)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[S004]"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn infeasible_json_report_carries_status() {
    let poll = fixture("lab_poll.json");
    let bounds = fixture("infeasible.toml");
    let output = shiftplan(&[
        "solve",
        path_arg(&poll),
        "-b",
        path_arg(&bounds),
        "--format",
        "json",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["status"], "infeasible");
    assert!(report["calendar"].is_null());
}

#[test]
fn unknown_person_in_bounds_is_rejected() {
    let poll = fixture("lab_poll.json");
    let bounds = fixture("unknown_person.toml");
    let output = shiftplan(&["solve", path_arg(&poll), "-b", path_arg(&bounds)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[S007]"));
}

#[test]
fn zero_daily_cap_is_rejected() {
    let poll = fixture("lab_poll.json");
    let output = shiftplan(&["solve", path_arg(&poll), "--max-shifts-per-day", "0"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("S007"));
}

#[test]
fn overflowing_utc_offset_is_rejected() {
    let poll = fixture("lab_poll.json");
    let output = shiftplan(&["check", path_arg(&poll), "--utc-offset", "71582789"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("UTC offset of 71582789 minutes is out of range"));
}

// =============================================================================
// Diagnostic policy
// =============================================================================

#[test]
fn unassignable_shift_warns_but_succeeds() {
    let poll = fixture("gap_poll.json");
    let output = shiftplan(&["solve", path_arg(&poll)]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("warning[S001]"));
    assert!(stdout(&output).contains("Unassigned shifts: 1"));
}

#[test]
fn strict_turns_warning_into_failure() {
    let poll = fixture("gap_poll.json");
    let output = shiftplan(&["--strict", "solve", path_arg(&poll)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[S001]"));
}

#[test]
fn quiet_hides_warnings_without_changing_exit_code() {
    let poll = fixture("gap_poll.json");
    let output = shiftplan(&["-q", "solve", path_arg(&poll)]);

    assert_eq!(output.status.code(), Some(0));
    assert!(!stderr(&output).contains("S001"));
}

// =============================================================================
// check
// =============================================================================

#[test]
fn check_summarizes_inputs() {
    let poll = fixture("lab_poll.json");
    let bounds = fixture("lab_bounds.toml");
    let output = shiftplan(&["check", path_arg(&poll), "-b", path_arg(&bounds)]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Poll: March lab rota"));
    assert!(text.contains("People: 3  Days: 3  Shifts: 6  Assignable: 6  Max per day: 1"));
    assert!(text.contains("  ann: min 1 max 3"));
    assert!(text.contains("  bo: min 0 max 2"));
}

#[test]
fn missing_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let output = shiftplan(&["check", path_arg(&missing)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("error: Failed to read poll snapshot"));
}

//! Integration tests for the `rfcapture` CLI, driving the actual binary
//! with [`assert_cmd`] instead of calling into the library directly.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn rfcapture() -> Command {
    Command::cargo_bin("rfcapture").unwrap()
}

/// Isolate `directories::ProjectDirs` lookups to a scratch `HOME` so tests
/// never read or write the real user's config.
fn isolated_home() -> TempDir {
    TempDir::new().unwrap()
}

#[test]
fn help_lists_subcommands() {
    rfcapture()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rfcapture"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_reports_the_binary_name() {
    rfcapture()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rfcapture"));
}

#[test]
fn config_init_then_show_round_trips_defaults() {
    let home = isolated_home();

    rfcapture()
        .env("HOME", home.path())
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote default config"));

    rfcapture()
        .env("HOME", home.path())
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("format"))
        .stdout(predicate::str::contains("device_path"))
        .stdout(predicate::str::contains("usb_transfer_queue_bytes"));
}

#[test]
fn config_show_works_without_an_existing_config_file() {
    let home = isolated_home();

    rfcapture()
        .env("HOME", home.path())
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("format"));
}

#[test]
fn start_without_output_fails_argument_parsing() {
    let home = isolated_home();

    rfcapture()
        .env("HOME", home.path())
        .arg("start")
        .assert()
        .failure();
}

#[test]
fn start_runs_a_short_capture_and_produces_rf_and_audio_files() {
    let home = isolated_home();
    let output_dir = TempDir::new().unwrap();
    let rf_path = output_dir.path().join("capture.rf");

    rfcapture()
        .env("HOME", home.path())
        .args([
            "start",
            "--output",
            rf_path.to_str().unwrap(),
            "--duration",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("capture finished"));

    assert!(rf_path.exists());
    assert!(output_dir.path().join("capture.audio.wav").exists());
    assert!(output_dir.path().join("capture.audio24.wav").exists());
}

#[test]
fn start_with_json_format_prints_a_result_summary() {
    let home = isolated_home();
    let output_dir = TempDir::new().unwrap();
    let rf_path = output_dir.path().join("json.rf");

    rfcapture()
        .env("HOME", home.path())
        .args([
            "start",
            "--output",
            rf_path.to_str().unwrap(),
            "--duration",
            "1",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"result\""))
        .stdout(predicate::str::contains("\"buffers_written\""));
}

#[test]
fn config_show_with_json_format_is_valid_json() {
    let home = isolated_home();

    rfcapture()
        .env("HOME", home.path())
        .args(["config", "--show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"device_path\""));
}

#[test]
fn start_in_verbose_mode_still_succeeds() {
    let home = isolated_home();
    let output_dir = TempDir::new().unwrap();
    let rf_path = output_dir.path().join("verbose.rf");

    rfcapture()
        .env("HOME", home.path())
        .args([
            "--verbose",
            "start",
            "--output",
            rf_path.to_str().unwrap(),
            "--duration",
            "1",
        ])
        .assert()
        .success();

    assert!(rf_path.exists());
}

use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for the simulated backend.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
tx_pin = 16
send_repeat = 2

[shutters."1"]
name = "Rolluik1"
duration_down = 0.1
duration_up = 0.1
intermediate_position = 50
code = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn rts(config: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("rts_cli").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[rstest]
#[case::bare_read(&["position", "1"], "position: 0")]
#[case::program_does_not_track(&["program", "1"], "position: 0")]
fn quick_verbs_report_the_default_position(#[case] args: &[&str], #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let config = write_valid_config(&dir);
    rts(&config)
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(needle));
}

#[test]
fn lower_reports_json_when_asked() {
    let dir = tempdir().unwrap();
    let config = write_valid_config(&dir);
    let output = rts(&config)
        .args(["--json", "lower", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let line = String::from_utf8(output).unwrap();
    let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(value["id"], "1");
    // Reported right after the frame goes out, before travel finishes.
    assert_eq!(value["position"], 100);
}

#[test]
fn lower_with_wait_settles_at_zero() {
    let dir = tempdir().unwrap();
    let config = write_valid_config(&dir);
    rts(&config)
        .args(["--wait", "--json", "lower", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"position\":0"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("nope.toml");
    rts(&config)
        .args(["position", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading config"));
}

#[test]
fn invalid_config_is_rejected_before_any_send() {
    let dir = tempdir().unwrap();
    let config = write_valid_config(&dir);
    let broken = fs::read_to_string(&config)
        .unwrap()
        .replace("send_repeat = 2", "send_repeat = 0");
    fs::write(&config, broken).unwrap();

    rts(&config)
        .args(["lower", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("send_repeat"));
}

#[test]
fn partial_target_outside_range_is_a_usage_error() {
    let dir = tempdir().unwrap();
    let config = write_valid_config(&dir);
    rts(&config)
        .args(["lower-partial", "1", "150"])
        .assert()
        .code(2);
}

#[test]
fn unknown_shutter_id_fails() {
    let dir = tempdir().unwrap();
    let config = write_valid_config(&dir);
    rts(&config)
        .args(["lower", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown shutter"));
}

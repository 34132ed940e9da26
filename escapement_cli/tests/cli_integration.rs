use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

// Small calibration so a run reaches RUN mode within a few dozen beats. The
// simulated temperature sits on a bucket centre (20.25 °C, bucket 14).
fn write_valid_config(dir: &TempDir) -> PathBuf {
    let toml = r#"
[calibration]
temp_min_c = 13
temp_steps = 50
warmup_beats = 4
target_samples = 8

[timing]
max_beat_ms = 5000

[simulation]
period_us = 500000.0
temperature_c = 20.25
sensor = true
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn escapement(cfg: &Path, store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("escapement").unwrap();
    cmd.arg("--config").arg(cfg).arg("--store").arg(store);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["simulate", "--beats", "40"], 0, "final mode run", "stdout")]
#[case(&["simulate", "--mode", "bogus"], 2, "unknown mode", "stderr")]
#[case(&["simulate", "--temp-end", "25"], 2, "--beats", "stderr")]
#[case(&["show"], 5, "No calibration record is stored", "stderr")]
#[case(&["bias"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let mut cmd = escapement(&cfg, &dir.path().join("record.bin"));
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => assert.stdout(predicate::str::contains(needle)),
        _ => assert.stderr(predicate::str::contains(needle)),
    };
}

#[test]
fn simulate_calibrates_then_show_reports_the_bucket() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("record.bin");

    escapement(&cfg, &store)
        .args(["simulate", "--beats", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("120.000 bpm"))
        .stdout(predicate::str::contains("1 confirmed buckets"));
    assert!(store.exists());

    escapement(&cfg, &store)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 confirmed of 50"))
        .stdout(predicate::str::contains("#14"));
}

#[test]
fn second_simulation_warm_starts() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("record.bin");

    escapement(&cfg, &store)
        .args(["simulate", "--beats", "40"])
        .assert()
        .success();
    escapement(&cfg, &store)
        .args(["simulate", "--beats", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting in warmstart"));
    escapement(&cfg, &store)
        .args(["simulate", "--beats", "3", "--cold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting in coldstart"));
}

#[test]
fn json_simulation_emits_one_object_per_line() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = escapement(&cfg, &dir.path().join("record.bin"))
        .args(["--json", "simulate", "--beats", "20"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("each line is JSON"))
        .collect();
    assert_eq!(lines.len(), 21);
    assert_eq!(lines[0]["outcome"], "first");
    assert_eq!(lines[1]["outcome"], "accepted");
    assert_eq!(lines[1]["measured_us"], 500_000);
    let summary = &lines[20]["summary"];
    assert_eq!(summary["passages"], 20);
    assert_eq!(summary["final_mode"], "run");
}

#[test]
fn export_then_import_round_trips_the_table() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("record.bin");
    let csv = dir.path().join("table.csv");

    escapement(&cfg, &store)
        .args(["simulate", "--beats", "40"])
        .assert()
        .success();
    escapement(&cfg, &store)
        .arg("export")
        .arg(&csv)
        .assert()
        .success();

    let text = fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("bucket,temp_c,avg_duration_us,sample_count,status"));
    assert!(text.contains("confirmed"));

    let other = dir.path().join("other.bin");
    escapement(&cfg, &other)
        .arg("import")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 confirmed"));
    escapement(&cfg, &other)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 confirmed of 50"));
}

#[test]
fn import_rejects_wrong_headers() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "raw,grams\n1,2\n").unwrap();

    escapement(&cfg, &dir.path().join("record.bin"))
        .arg("import")
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers in calibration CSV"));
}

#[test]
fn bias_and_reset_keep_bias() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("record.bin");

    escapement(&cfg, &store)
        .args(["bias", "40"])
        .assert()
        .success();
    escapement(&cfg, &store)
        .args(["bias", "--relative", "-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Clock bias set to 25"));
    escapement(&cfg, &store)
        .args(["reset", "--keep-bias"])
        .assert()
        .success()
        .stdout(predicate::str::contains("clock bias 25"));

    let out = escapement(&cfg, &store)
        .args(["--json", "show"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["clock_bias"], 25);
    assert_eq!(v["confirmed_buckets"], 0);
}

#[test]
fn missing_store_path_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    Command::cargo_bin("escapement")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("show")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No calibration record file is configured"));
}

#[test]
fn corrupt_store_is_reported_as_store_error() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("record.bin");
    fs::write(&store, [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]).unwrap();

    escapement(&cfg, &store)
        .arg("show")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("could not be used"));
}

#[rstest]
#[case("[calibration]\ntemp_steps = 0\n", "Configuration is invalid")]
#[case("[timing]\nmax_beat_ms = 0\n", "max_beat_ms")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
#[case("[calibration\n", "Configuration is invalid")]
fn invalid_config_is_rejected(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();

    escapement(&cfg, &dir.path().join("record.bin"))
        .args(["simulate", "--beats", "2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = escapement(&cfg, &dir.path().join("missing.bin"))
        .args(["--json", "show"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(5));
    let v: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(v["reason"], "Store");
}

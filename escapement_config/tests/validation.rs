use escapement_config::{Policy, load_toml};
use rstest::rstest;

#[test]
fn empty_file_gives_valid_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.calibration.temp_min_c, 13);
    assert_eq!(cfg.calibration.temp_steps, 50);
    assert_eq!(cfg.calibration.policy, Policy::Regression);
    assert_eq!(cfg.timing.max_beat_ms, 5_000);
    assert!(cfg.pins.is_none());
    assert!(cfg.store.path.is_none());
}

#[test]
fn full_file_parses() {
    let toml = r#"
[pins]
sense = 17
kick = 27

[calibration]
temp_min_c = 5
temp_steps = 80
warmup_beats = 32
target_samples = 1024
capture_window_c = 0.0625
policy = "interpolate"

[timing]
max_beat_ms = 2500

[store]
path = "/var/lib/escapement/record.bin"

[simulation]
period_us = 1000000.0
temp_coeff_us_per_c = 12.5
temperature_c = 18.0
jitter_us = 40.0
reference_bias = -30
sensor = false
realtime = true

[hardware]
tmp102_address = 0x49

[logging]
file = "logs/escapement.log"
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    let pins = cfg.pins.expect("pins present");
    assert_eq!((pins.sense, pins.kick), (17, 27));
    assert_eq!(cfg.calibration.policy, Policy::Interpolate);
    assert_eq!(cfg.calibration.temp_steps, 80);
    assert_eq!(cfg.simulation.reference_bias, -30);
    assert!(!cfg.simulation.sensor);
    assert_eq!(cfg.hardware.tmp102_address, 0x49);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[rstest]
#[case("[calibration]\ntemp_min_c = -100\n", "temp_min_c")]
#[case("[calibration]\ntemp_steps = 0\n", "temp_steps")]
#[case("[calibration]\ntemp_steps = 1000\n", "temp_steps")]
#[case("[calibration]\nwarmup_beats = 0\n", "warmup_beats")]
#[case("[calibration]\ntarget_samples = 0\n", "target_samples")]
#[case("[calibration]\ncapture_window_c = 0.0\n", "capture_window_c")]
#[case("[calibration]\ncapture_window_c = 0.5\n", "capture_window_c")]
#[case("[timing]\nmax_beat_ms = 0\n", "max_beat_ms")]
#[case("[timing]\nmax_beat_ms = 120000\n", "max_beat_ms")]
#[case("[simulation]\nperiod_us = 0.0\n", "period_us")]
#[case("[simulation]\njitter_us = -1.0\n", "jitter_us")]
#[case("[simulation]\nperiod_us = 100.0\njitter_us = 100.0\n", "jitter_us")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] field: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        err.to_string().contains(field),
        "expected {field} in: {err}"
    );
}

#[test]
fn unknown_policy_fails_to_parse() {
    let err = load_toml("[calibration]\npolicy = \"cubic\"\n").expect_err("unknown variant");
    assert!(err.to_string().contains("cubic"));
}

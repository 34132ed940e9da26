//! Human-readable error descriptions and structured JSON error formatting.

use escapement_core::error::{BuildError, EscapementError};
use escapement_core::StoreError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransducer => {
                "What happened: No transducer was provided to the controller.\nLikely causes: The coil or simulated oscillator failed to initialize.\nHow to fix: Ensure the transducer is created successfully and passed via with_transducer(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [calibration] or [timing], or a record made for a different bucket grid.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<EscapementError>() {
        return match de {
            EscapementError::Timeout => "What happened: No passage was detected in time.\nLikely causes: The bendulum stopped swinging, or the sense coil is not wired to the configured pin.\nHow to fix: Restart the swing by hand and check [pins].sense in the config.".to_string(),
            EscapementError::Hardware(msg) | EscapementError::HardwareFault(msg) => format!(
                "What happened: The transducer failed ({msg}).\nLikely causes: Wrong GPIO pins or insufficient GPIO permissions.\nHow to fix: Fix [pins] in the config; ensure the process may access GPIO."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<StoreError>() {
        return match se {
            StoreError::NotFound => "What happened: No calibration record is stored.\nLikely causes: The controller has not completed a calibration yet, or --store points elsewhere.\nHow to fix: Run `escapement simulate` (or `run`) until a bucket is confirmed, or import a CSV.".to_string(),
            StoreError::LayoutMismatch { expected, found } => format!(
                "What happened: The stored record has {found} buckets but the config expects {expected}.\nLikely causes: calibration.temp_steps changed since the record was written.\nHow to fix: Restore the previous temp_steps, or run `escapement reset`."
            ),
            other => format!(
                "What happened: The calibration record could not be used ({other}).\nLikely causes: A torn write or a file that is not a calibration record.\nHow to fix: Run `escapement reset` and calibrate again."
            ),
        };
    }

    // String-based heuristics for errors coming from config or CSV parsing
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'bucket,temp_c,avg_duration_us,sample_count,status'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parsing config") {
        let cause = err
            .chain()
            .nth(1)
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid{cause}.\nLikely causes: Out-of-range values or a typo in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("no store path") {
        return "What happened: No calibration record file is configured.\nLikely causes: [store].path is unset and --store was not given.\nHow to fix: Pass --store <FILE> or set [store].path in the config.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.chain().nth(1) {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error family; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(de) = err.downcast_ref::<EscapementError>() {
        return match de {
            EscapementError::Timeout => 3,
            EscapementError::Hardware(_) | EscapementError::HardwareFault(_) => 4,
            _ => 1,
        };
    }
    if err.downcast_ref::<StoreError>().is_some() {
        return 5;
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return 6;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(de) = err.downcast_ref::<EscapementError>() {
        return match de {
            EscapementError::Timeout => "Timeout",
            EscapementError::Hardware(_) | EscapementError::HardwareFault(_) => "Hardware",
            EscapementError::Config(_) => "Config",
            EscapementError::State(_) => "State",
            EscapementError::Store(_) => "Store",
        };
    }
    if err.downcast_ref::<StoreError>().is_some() {
        return "Store";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn timeout_survives_context() {
        let err: eyre::Result<()> = Err(eyre::Report::new(EscapementError::Timeout));
        let err = err.wrap_err("awaiting passage").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("No passage was detected"));
    }

    #[test]
    fn layout_mismatch_names_both_counts() {
        let err = eyre::Report::new(StoreError::LayoutMismatch {
            expected: 50,
            found: 40,
        });
        let text = humanize(&err);
        assert!(text.contains("40 buckets"));
        assert!(text.contains("expects 50"));
        assert_eq!(exit_code_for_error(&err), 5);
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let err = eyre::Report::new(BuildError::InvalidConfig("temp_steps must be >= 1"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Config");
        assert_eq!(v["exit_code"], 6);
        assert!(v["message"].as_str().unwrap().contains("temp_steps"));
    }

    #[test]
    fn unknown_errors_fall_back() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).starts_with("Something went wrong."));
    }
}

use std::cell::Cell;

use escapement_core::mocks::ScriptedTransducer;
use escapement_core::runner::run;
use escapement_core::{BeatOutcome, CalibrationCfg, Escapement, RunMode};

fn controller(n: usize) -> Escapement {
    Escapement::builder()
        .with_transducer(ScriptedTransducer::periodic(0, 500_000, n))
        .with_calibration(CalibrationCfg {
            warmup_beats: 2,
            target_samples: 3,
            ..CalibrationCfg::default()
        })
        .build()
        .unwrap()
}

#[test]
fn runs_to_the_beat_limit() {
    let mut esc = controller(50);
    esc.enable(None);
    let mut seen = Vec::new();
    let summary = run(&mut esc, Some(12), || false, |r, _| {
        seen.push(r.outcome);
        Ok(())
    })
    .unwrap();
    assert_eq!(summary.passages, 12);
    assert_eq!(summary.accepted, 11);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.final_mode, RunMode::Run);
    assert!((summary.bpm_model - 120.0).abs() < 1e-3);
    // coldstart->warmstart->collect->model->run
    assert_eq!(summary.mode_changes, 4);
    assert_eq!(seen[0], BeatOutcome::First);
}

#[test]
fn stop_flag_ends_the_run() {
    let mut esc = controller(50);
    esc.enable(None);
    let count = Cell::new(0u32);
    let summary = run(
        &mut esc,
        None,
        || count.get() >= 5,
        |_, _| {
            count.set(count.get() + 1);
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(summary.passages, 5);
}

#[test]
fn transducer_error_ends_the_run() {
    let mut esc = controller(3);
    esc.enable(None);
    assert!(run(&mut esc, None, || false, |_, _| Ok(())).is_err());
}

#[test]
fn callback_error_ends_the_run() {
    let mut esc = controller(10);
    esc.enable(None);
    let err = run(&mut esc, None, || false, |r, _| {
        if r.outcome == BeatOutcome::Accepted {
            eyre::bail!("sink closed");
        }
        Ok(())
    })
    .unwrap_err();
    assert!(err.to_string().contains("sink closed"));
}

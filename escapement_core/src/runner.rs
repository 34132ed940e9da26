//! Beat loop driver used by the CLI and the simulation tests.

use escapement_traits::{PersistentStore, TemperatureSensor, Transducer};

use crate::controller::EscapementCore;
use crate::error::Result;
use crate::mode::RunMode;
use crate::status::{BeatOutcome, BeatReport};

/// Totals for one `run` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Passages processed, including the first detection and rejects.
    pub passages: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub mode_changes: u64,
    pub final_mode: RunMode,
    pub bpm_model: f32,
}

/// Drive `beat_report` until `max_beats` passages were processed or
/// `should_stop` returns true. The controller must already be enabled.
///
/// `on_beat` sees every report together with the controller state after it;
/// an error from the callback ends the run.
pub fn run<T, S, P, F>(
    escapement: &mut EscapementCore<T, S, P>,
    max_beats: Option<u64>,
    should_stop: impl Fn() -> bool,
    mut on_beat: F,
) -> Result<RunSummary>
where
    T: Transducer,
    S: TemperatureSensor,
    P: PersistentStore,
    F: FnMut(&BeatReport, &EscapementCore<T, S, P>) -> Result<()>,
{
    let mut summary = RunSummary {
        passages: 0,
        accepted: 0,
        rejected: 0,
        mode_changes: 0,
        final_mode: escapement.mode(),
        bpm_model: 0.0,
    };
    while max_beats.is_none_or(|max| summary.passages < max) {
        if should_stop() {
            tracing::info!(passages = summary.passages, "stop requested");
            break;
        }
        let report = escapement.beat_report()?;
        summary.passages += 1;
        match report.outcome {
            BeatOutcome::Accepted => summary.accepted += 1,
            BeatOutcome::Rejected => summary.rejected += 1,
            BeatOutcome::First => {}
        }
        if report.mode_after != report.mode_before {
            summary.mode_changes += 1;
        }
        on_beat(&report, escapement)?;
    }
    summary.final_mode = escapement.mode();
    summary.bpm_model = escapement.bpm_model();
    Ok(summary)
}

//! Per-beat report returned by the controller.

use serde::Serialize;

use crate::mode::RunMode;

/// What happened to one detected passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatOutcome {
    /// First detection after enable; there is no interval yet.
    First,
    /// Interval was non-positive or too long and was discarded.
    Rejected,
    /// Interval went through the state machine.
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeatReport {
    pub outcome: BeatOutcome,
    /// Duration handed to the caller; 0 unless accepted.
    pub duration_us: i64,
    /// Bias-corrected measured interval; 0 for the first detection.
    pub measured_us: i64,
    pub mode_before: RunMode,
    pub mode_after: RunMode,
    pub temperature_c: Option<f32>,
    /// Whether this beat was a tick (as opposed to a tock).
    pub tick: bool,
}

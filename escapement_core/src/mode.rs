//! Operating modes and the per-beat transition function.
//!
//! [`next_step`] is pure: it sees the measured beat, the temperature slot and a
//! read-only view of the calibration, and says which mode follows, what
//! duration to report and how the record should change. The controller applies
//! the result and runs mode entry actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::CalibrationCfg;
use crate::fixed_point::round_to_i64;
use crate::record::{BucketGrid, CalibrationRecord, TempSlot};
use crate::regression::{RegressionModel, predict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Forget everything and start calibrating from scratch.
    ColdStart,
    /// Restart calibration, keeping the clock bias.
    CalStart,
    /// Let the oscillator settle before collecting.
    WarmStart,
    /// Fill the bucket for the current temperature.
    Collect,
    /// Fit the temperature model.
    Model,
    /// Report modelled beat durations.
    Run,
    /// Reference clock calibration; beats pass through unchanged.
    CalRtc,
}

impl RunMode {
    pub const ALL: [RunMode; 7] = [
        RunMode::ColdStart,
        RunMode::CalStart,
        RunMode::WarmStart,
        RunMode::Collect,
        RunMode::Model,
        RunMode::Run,
        RunMode::CalRtc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RunMode::ColdStart => "coldstart",
            RunMode::CalStart => "calstart",
            RunMode::WarmStart => "warmstart",
            RunMode::Collect => "collect",
            RunMode::Model => "model",
            RunMode::Run => "run",
            RunMode::CalRtc => "calrtc",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode '{}'", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for RunMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        RunMode::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or(UnknownMode(s.to_string()))
    }
}

/// One accepted beat as seen by the transition function.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    /// Bias-corrected beat duration, microseconds.
    pub measured_us: i64,
    pub slot: TempSlot,
    /// Beats already spent in the current mode.
    pub phase_counter: u32,
}

/// Read-only calibration state handed to [`next_step`].
#[derive(Debug, Clone, Copy)]
pub struct CalibrationView<'a> {
    pub record: &'a CalibrationRecord,
    pub model: Option<&'a RegressionModel>,
    pub cfg: &'a CalibrationCfg,
    pub grid: &'a BucketGrid,
    /// Set when a bucket was confirmed since the last model build.
    pub calibration_changed: bool,
}

impl CalibrationView<'_> {
    /// Temperature the model is evaluated at for this slot. Uncompensated
    /// operation uses bucket 0's centre.
    pub fn eval_temp_c(&self, slot: &TempSlot) -> Option<f64> {
        match *slot {
            TempSlot::Fixed => Some(self.grid.center_c(0)),
            TempSlot::Bucket { c256, .. } => Some(f64::from(c256) / 256.0),
            TempSlot::OutOfRange { .. } | TempSlot::Unavailable => None,
        }
    }

    /// Modelled duration including manual adjust, when a model exists and the
    /// slot has a usable temperature.
    pub fn predicted_us(&self, slot: &TempSlot) -> Option<i64> {
        let model = self.model?;
        let temp_c = self.eval_temp_c(slot)?;
        let raw = predict(
            model,
            self.cfg.policy,
            self.record,
            self.grid,
            slot.index(),
            temp_c,
        );
        Some(round_to_i64(raw).saturating_add(self.record.manual_adjust))
    }
}

/// Record change requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDelta {
    None,
    /// Fold the duration into the bucket.
    Fold { bucket: usize, duration_us: i64 },
    /// Refit the model; optionally zero the manual adjust first.
    Rebuild { reset_adjust: bool },
}

/// Outcome of one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: RunMode,
    pub duration_us: i64,
    pub delta: RecordDelta,
}

impl Step {
    fn stay(mode: RunMode, duration_us: i64) -> Self {
        Self {
            next: mode,
            duration_us,
            delta: RecordDelta::None,
        }
    }

    fn to(next: RunMode, duration_us: i64) -> Self {
        Self {
            next,
            duration_us,
            delta: RecordDelta::None,
        }
    }
}

/// Decide what this beat does in `mode`.
pub fn next_step(mode: RunMode, obs: &Observation, view: &CalibrationView<'_>) -> Step {
    let measured = obs.measured_us;
    match mode {
        RunMode::ColdStart | RunMode::CalStart => Step::to(RunMode::WarmStart, measured),
        RunMode::WarmStart => {
            if obs.phase_counter.saturating_add(1) < view.cfg.warmup_beats {
                Step::stay(mode, measured)
            } else if view.record.confirmed_count() > 0 {
                Step::to(RunMode::Model, measured)
            } else {
                Step::to(RunMode::Collect, measured)
            }
        }
        RunMode::Collect => collect(obs, view),
        RunMode::Model => {
            if view.record.confirmed_count() == 0 {
                Step::to(RunMode::Collect, measured)
            } else {
                Step {
                    next: RunMode::Run,
                    duration_us: measured,
                    delta: RecordDelta::Rebuild {
                        reset_adjust: view.calibration_changed,
                    },
                }
            }
        }
        RunMode::Run => run(obs, view),
        RunMode::CalRtc => Step::stay(mode, measured),
    }
}

fn collect(obs: &Observation, view: &CalibrationView<'_>) -> Step {
    let measured = obs.measured_us;
    let Some(index) = obs.slot.index() else {
        return Step::stay(RunMode::Collect, measured);
    };
    let Some(bucket) = view.record.bucket(index) else {
        return Step::stay(RunMode::Collect, measured);
    };
    if bucket.is_confirmed() {
        return Step::to(RunMode::Model, measured);
    }
    if !view.grid.captures(&obs.slot, view.cfg.capture_window_c256) {
        return Step::stay(RunMode::Collect, measured);
    }
    let confirms = bucket.sample_count.saturating_add(1) >= view.cfg.target_samples;
    Step {
        next: if confirms {
            RunMode::Model
        } else {
            RunMode::Collect
        },
        duration_us: measured,
        delta: RecordDelta::Fold {
            bucket: index,
            duration_us: measured,
        },
    }
}

fn run(obs: &Observation, view: &CalibrationView<'_>) -> Step {
    let measured = obs.measured_us;
    if view.model.is_none() {
        return Step::to(RunMode::Model, measured);
    }
    let duration = view.predicted_us(&obs.slot).unwrap_or(measured);
    let unconfirmed_here = obs
        .slot
        .index()
        .and_then(|i| view.record.bucket(i))
        .is_some_and(|b| !b.is_confirmed());
    if unconfirmed_here {
        Step::to(RunMode::Collect, duration)
    } else {
        Step::stay(RunMode::Run, duration)
    }
}

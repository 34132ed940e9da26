//! Runtime configuration for the escapement controller.
//!
//! Separate from the TOML schema in `escapement_config`; see `conversions`.

use serde::{Deserialize, Serialize};

use crate::record::BucketGrid;

/// How RUN mode turns the calibration table into a beat duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPolicy {
    /// Least-squares line through every confirmed bucket.
    #[default]
    Regression,
    /// The current bucket's own average when confirmed, else the line.
    Nearest,
    /// Linear interpolation between the confirmed buckets either side of the
    /// reading, else the line.
    Interpolate,
}

/// Calibration table geometry and phase lengths.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Lower edge of bucket 0, whole degrees Celsius.
    pub temp_min_c: i32,
    /// Number of half-degree buckets.
    pub temp_steps: usize,
    /// Beats spent in WARMSTART.
    pub warmup_beats: u32,
    /// Samples that confirm a bucket.
    pub target_samples: u32,
    /// A reading is credited to its bucket only within this distance of the
    /// bucket centre, °C × 256.
    pub capture_window_c256: i32,
    pub policy: ModelPolicy,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            temp_min_c: 13,
            temp_steps: 50,
            warmup_beats: 64,
            target_samples: 4096,
            capture_window_c256: 32,
            policy: ModelPolicy::Regression,
        }
    }
}

impl CalibrationCfg {
    pub fn grid(&self) -> BucketGrid {
        BucketGrid::new(self.temp_min_c, self.temp_steps)
    }
}

/// Beat acceptance limits.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Longer corrected intervals are rejected as missed detections.
    pub max_beat_us: i64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            max_beat_us: 5_000_000,
        }
    }
}

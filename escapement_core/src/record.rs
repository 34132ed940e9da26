//! Calibration record and the temperature bucket grid.
//!
//! The grid splits `[temp_min, temp_min + steps/2)` °C into half-degree
//! buckets. Each bucket keeps a running mean of the beat durations observed
//! while the oscillator sat near the bucket centre.

use serde::{Deserialize, Serialize};

/// Sentinel stamped on a record once it has been persisted.
pub const RECORD_TAG: u32 = 0xA1CF;

/// Bucket lifecycle. Only `Confirmed` buckets feed the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketStatus {
    #[default]
    Empty,
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBucket {
    /// Running mean of corrected beat durations, microseconds.
    pub avg_duration_us: f64,
    /// Samples folded into the mean.
    pub sample_count: u32,
    pub status: BucketStatus,
}

impl TemperatureBucket {
    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.status == BucketStatus::Confirmed
    }

    /// Fold one duration into the running mean.
    ///
    /// Returns `true` when this sample brought the count to `target` and
    /// confirmed the bucket. Confirmed buckets are left untouched.
    pub fn fold(&mut self, duration_us: i64, target: u32) -> bool {
        if self.is_confirmed() {
            return false;
        }
        self.sample_count = self.sample_count.saturating_add(1);
        let d = duration_us as f64;
        self.avg_duration_us += (d - self.avg_duration_us) / f64::from(self.sample_count);
        if self.sample_count >= target {
            self.status = BucketStatus::Confirmed;
            true
        } else {
            self.status = BucketStatus::Pending;
            false
        }
    }
}

/// Everything that survives a power cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Equals [`RECORD_TAG`] only after a successful save.
    pub valid_tag: u32,
    /// Reference clock error, tenths of a second per day.
    pub clock_bias: i32,
    /// User offset added to modelled beats, microseconds.
    pub manual_adjust: i64,
    /// Whether the buckets were collected with a working sensor.
    pub temp_compensated: bool,
    pub buckets: Vec<TemperatureBucket>,
}

impl CalibrationRecord {
    pub fn new(steps: usize, temp_compensated: bool) -> Self {
        Self {
            valid_tag: 0,
            clock_bias: 0,
            manual_adjust: 0,
            temp_compensated,
            buckets: vec![TemperatureBucket::default(); steps],
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid_tag == RECORD_TAG
    }

    pub fn bucket(&self, index: usize) -> Option<&TemperatureBucket> {
        self.buckets.get(index)
    }

    pub fn bucket_mut(&mut self, index: usize) -> Option<&mut TemperatureBucket> {
        self.buckets.get_mut(index)
    }

    /// Reset every bucket to `Empty`.
    pub fn clear_buckets(&mut self) {
        self.buckets.fill(TemperatureBucket::default());
    }

    pub fn confirmed(&self) -> impl Iterator<Item = (usize, &TemperatureBucket)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_confirmed())
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed().count()
    }
}

/// Where the current temperature reading lands on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempSlot {
    /// Uncompensated operation: everything is credited to bucket 0.
    Fixed,
    /// Reading inside the grid.
    Bucket { index: usize, c256: i32 },
    /// Reading outside the grid.
    OutOfRange { c256: i32 },
    /// Sensor read failed.
    Unavailable,
}

impl TempSlot {
    pub fn index(&self) -> Option<usize> {
        match *self {
            TempSlot::Fixed => Some(0),
            TempSlot::Bucket { index, .. } => Some(index),
            TempSlot::OutOfRange { .. } | TempSlot::Unavailable => None,
        }
    }

    /// Last reading in °C × 256, when one exists.
    pub fn c256(&self) -> Option<i32> {
        match *self {
            TempSlot::Bucket { c256, .. } | TempSlot::OutOfRange { c256 } => Some(c256),
            TempSlot::Fixed | TempSlot::Unavailable => None,
        }
    }
}

/// Half-degree bucket geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketGrid {
    pub temp_min_c: i32,
    pub steps: usize,
}

impl BucketGrid {
    pub fn new(temp_min_c: i32, steps: usize) -> Self {
        Self { temp_min_c, steps }
    }

    /// Classify a reading. `floor(c256 / 128) - 2 * temp_min` is the index.
    pub fn slot_for(&self, c256: i32) -> TempSlot {
        let half_degrees = i64::from(c256.div_euclid(128));
        let index = half_degrees - 2 * i64::from(self.temp_min_c);
        match usize::try_from(index) {
            Ok(index) if index < self.steps => TempSlot::Bucket { index, c256 },
            _ => TempSlot::OutOfRange { c256 },
        }
    }

    /// Bucket centre in °C × 256.
    pub fn center_c256(&self, index: usize) -> i32 {
        let half_degrees = 2 * self.temp_min_c + index as i32;
        half_degrees * 128 + 64
    }

    pub fn center_c(&self, index: usize) -> f64 {
        f64::from(self.center_c256(index)) / 256.0
    }

    /// Lower edge of the bucket in °C.
    pub fn lower_edge_c(&self, index: usize) -> f64 {
        f64::from(self.temp_min_c) + index as f64 / 2.0
    }

    /// True when the slot's reading is close enough to its bucket centre to
    /// be credited. Uncompensated slots are always captured.
    pub fn captures(&self, slot: &TempSlot, window_c256: i32) -> bool {
        match *slot {
            TempSlot::Fixed => true,
            TempSlot::Bucket { index, c256 } => {
                (c256 - self.center_c256(index)).abs() <= window_c256
            }
            TempSlot::OutOfRange { .. } | TempSlot::Unavailable => false,
        }
    }
}

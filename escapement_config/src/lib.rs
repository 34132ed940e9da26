#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration table I/O for the escapement.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The per-bucket calibration table can be exported to and imported from
//!   CSV with strict headers, for inspection or for moving a calibration
//!   between devices.
use serde::{Deserialize, Serialize};
use std::path::Path;

/// GPIO wiring for the hardware backend.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    /// Comparator output that rises when the magnet passes the coil.
    pub sense: u8,
    /// Coil driver used for the kick pulse.
    pub kick: u8,
}

/// Prediction policy used in RUN mode.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    #[default]
    Regression,
    Nearest,
    Interpolate,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    /// Lower edge of the first half-degree bucket (°C).
    pub temp_min_c: i32,
    /// Number of half-degree buckets.
    pub temp_steps: usize,
    /// Beats spent in WARMSTART before calibration begins.
    pub warmup_beats: u32,
    /// Samples required before a bucket is confirmed.
    pub target_samples: u32,
    /// Only credit a bucket when the reading is this close to its centre (°C).
    pub capture_window_c: f32,
    pub policy: Policy,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            temp_min_c: 13,
            temp_steps: 50,
            warmup_beats: 64,
            target_samples: 4096,
            capture_window_c: 0.125,
            policy: Policy::Regression,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    /// Beats longer than this are treated as missed or spurious detections.
    pub max_beat_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self { max_beat_ms: 5_000 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    /// Calibration record file. When absent the record lives in memory only.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub period_us: f64,
    pub temp_coeff_us_per_c: f64,
    pub temperature_c: f32,
    pub jitter_us: f64,
    /// Reference clock error to simulate, tenths of a second per day.
    pub reference_bias: i32,
    /// Attach a simulated thermometer.
    pub sensor: bool,
    /// Pace beats in real time instead of a virtual clock.
    pub realtime: bool,
    pub seed: u32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            period_us: 500_000.0,
            temp_coeff_us_per_c: 0.0,
            temperature_c: 20.0,
            jitter_us: 0.0,
            reference_bias: 0,
            sensor: true,
            realtime: false,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// I2C address of the TMP102 temperature sensor.
    pub tmp102_address: u16,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            tmp102_address: 0x48,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pins: Option<Pins>,
    #[serde(default)]
    pub calibration: CalibrationSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        let cal = &self.calibration;
        if !(-60..=120).contains(&cal.temp_min_c) {
            eyre::bail!("calibration.temp_min_c must be in [-60, 120]");
        }
        if cal.temp_steps == 0 || cal.temp_steps > 400 {
            eyre::bail!("calibration.temp_steps must be in [1, 400]");
        }
        if cal.warmup_beats == 0 {
            eyre::bail!("calibration.warmup_beats must be >= 1");
        }
        if cal.target_samples == 0 {
            eyre::bail!("calibration.target_samples must be >= 1");
        }
        if !(cal.capture_window_c > 0.0 && cal.capture_window_c <= 0.25) {
            eyre::bail!("calibration.capture_window_c must be in (0.0, 0.25]");
        }

        // Timing
        if self.timing.max_beat_ms == 0 {
            eyre::bail!("timing.max_beat_ms must be >= 1");
        }
        if self.timing.max_beat_ms > 60_000 {
            eyre::bail!("timing.max_beat_ms is unreasonably large (>60s)");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.period_us.is_finite() && sim.period_us > 0.0) {
            eyre::bail!("simulation.period_us must be > 0");
        }
        if !sim.temp_coeff_us_per_c.is_finite() {
            eyre::bail!("simulation.temp_coeff_us_per_c must be finite");
        }
        if !(sim.jitter_us.is_finite() && sim.jitter_us >= 0.0) {
            eyre::bail!("simulation.jitter_us must be >= 0");
        }
        if sim.jitter_us >= sim.period_us {
            eyre::bail!("simulation.jitter_us must be smaller than simulation.period_us");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// Status column of the calibration table.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Empty,
    Pending,
    Confirmed,
}

/// Calibration table CSV schema.
///
/// Expected headers:
/// bucket,temp_c,avg_duration_us,sample_count,status
///
/// Example:
/// bucket,temp_c,avg_duration_us,sample_count,status
/// 0,13.25,500012.5,4096,confirmed
/// 1,13.75,0.0,0,empty
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct BucketRow {
    pub bucket: usize,
    /// Bucket centre, informational on import.
    pub temp_c: f32,
    pub avg_duration_us: f64,
    pub sample_count: u32,
    pub status: RowStatus,
}

const BUCKET_HEADERS: [&str; 5] = [
    "bucket",
    "temp_c",
    "avg_duration_us",
    "sample_count",
    "status",
];

pub fn load_bucket_csv(path: &Path) -> eyre::Result<Vec<BucketRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != BUCKET_HEADERS {
        eyre::bail!(
            "calibration CSV must have headers '{}', got: {}",
            BUCKET_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<BucketRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    validate_rows(&rows)?;
    Ok(rows)
}

/// Rows must list buckets 0..n in order with self-consistent statistics.
fn validate_rows(rows: &[BucketRow]) -> eyre::Result<()> {
    if rows.is_empty() {
        eyre::bail!("calibration CSV has no rows");
    }
    for (i, row) in rows.iter().enumerate() {
        if row.bucket != i {
            eyre::bail!(
                "calibration CSV buckets must be contiguous from 0; row {} has bucket {}",
                i + 2,
                row.bucket
            );
        }
        if !row.avg_duration_us.is_finite() || row.avg_duration_us < 0.0 {
            eyre::bail!("bucket {}: avg_duration_us must be a finite value >= 0", i);
        }
        match row.status {
            RowStatus::Empty if row.sample_count != 0 => {
                eyre::bail!("bucket {}: empty bucket must have sample_count 0", i);
            }
            RowStatus::Pending | RowStatus::Confirmed if row.sample_count == 0 => {
                eyre::bail!("bucket {}: {:?} bucket needs samples", i, row.status);
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn write_bucket_csv(path: &Path, rows: &[BucketRow]) -> eyre::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("create calibration CSV {:?}: {}", path, e))?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("write calibration CSV {:?}: {}", path, e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush calibration CSV {:?}: {}", path, e))?;
    Ok(())
}

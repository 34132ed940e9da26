//! `From` implementations bridging `escapement_config` types to core types.

use crate::config::{CalibrationCfg, ModelPolicy, TimingCfg};
use crate::fixed_point::celsius_to_c256;
use crate::record::{BucketGrid, BucketStatus, CalibrationRecord, TemperatureBucket};

impl From<escapement_config::Policy> for ModelPolicy {
    fn from(p: escapement_config::Policy) -> Self {
        match p {
            escapement_config::Policy::Regression => Self::Regression,
            escapement_config::Policy::Nearest => Self::Nearest,
            escapement_config::Policy::Interpolate => Self::Interpolate,
        }
    }
}

impl From<&escapement_config::CalibrationSection> for CalibrationCfg {
    fn from(c: &escapement_config::CalibrationSection) -> Self {
        Self {
            temp_min_c: c.temp_min_c,
            temp_steps: c.temp_steps,
            warmup_beats: c.warmup_beats,
            target_samples: c.target_samples,
            capture_window_c256: celsius_to_c256(c.capture_window_c).max(1),
            policy: c.policy.into(),
        }
    }
}

impl From<&escapement_config::TimingSection> for TimingCfg {
    fn from(c: &escapement_config::TimingSection) -> Self {
        Self {
            max_beat_us: i64::try_from(c.max_beat_ms.saturating_mul(1_000)).unwrap_or(i64::MAX),
        }
    }
}

impl From<escapement_config::RowStatus> for BucketStatus {
    fn from(s: escapement_config::RowStatus) -> Self {
        match s {
            escapement_config::RowStatus::Empty => Self::Empty,
            escapement_config::RowStatus::Pending => Self::Pending,
            escapement_config::RowStatus::Confirmed => Self::Confirmed,
        }
    }
}

impl From<BucketStatus> for escapement_config::RowStatus {
    fn from(s: BucketStatus) -> Self {
        match s {
            BucketStatus::Empty => Self::Empty,
            BucketStatus::Pending => Self::Pending,
            BucketStatus::Confirmed => Self::Confirmed,
        }
    }
}

impl From<&escapement_config::BucketRow> for TemperatureBucket {
    fn from(r: &escapement_config::BucketRow) -> Self {
        Self {
            avg_duration_us: r.avg_duration_us,
            sample_count: r.sample_count,
            status: r.status.into(),
        }
    }
}

/// Table rows for export, one per bucket.
pub fn bucket_rows(record: &CalibrationRecord, grid: &BucketGrid) -> Vec<escapement_config::BucketRow> {
    record
        .buckets
        .iter()
        .enumerate()
        .map(|(i, b)| escapement_config::BucketRow {
            bucket: i,
            temp_c: grid.center_c(i) as f32,
            avg_duration_us: b.avg_duration_us,
            sample_count: b.sample_count,
            status: b.status.into(),
        })
        .collect()
}

/// Replace the record's buckets with imported rows; the table length must match.
pub fn apply_bucket_rows(
    record: &mut CalibrationRecord,
    rows: &[escapement_config::BucketRow],
) -> crate::error::Result<()> {
    if rows.len() != record.buckets.len() {
        return Err(eyre::Report::new(crate::error::EscapementError::Config(
            format!(
                "calibration table has {} buckets, record expects {}",
                rows.len(),
                record.buckets.len()
            ),
        )));
    }
    for (bucket, row) in record.buckets.iter_mut().zip(rows) {
        *bucket = TemperatureBucket::from(row);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_section_defaults_convert() {
        let cfg = CalibrationCfg::from(&escapement_config::CalibrationSection::default());
        assert_eq!(cfg.temp_min_c, 13);
        assert_eq!(cfg.temp_steps, 50);
        assert_eq!(cfg.capture_window_c256, 32);
        assert_eq!(cfg.policy, ModelPolicy::Regression);
    }

    #[test]
    fn timing_converts_ms_to_us() {
        let t = TimingCfg::from(&escapement_config::TimingSection { max_beat_ms: 5_000 });
        assert_eq!(t.max_beat_us, 5_000_000);
    }

    #[test]
    fn rows_must_match_table_length() {
        let mut rec = CalibrationRecord::new(3, true);
        let grid = BucketGrid::new(13, 2);
        let rows = bucket_rows(&CalibrationRecord::new(2, true), &grid);
        assert!(apply_bucket_rows(&mut rec, &rows).is_err());
    }
}

//! Commands that work on the stored calibration record without running the
//! controller: show, export, import, reset, bias.

use std::io::Write;
use std::path::{Path, PathBuf};

use escapement_config::{Config, load_bucket_csv, write_bucket_csv};
use escapement_core::conversions::{apply_bucket_rows, bucket_rows};
use escapement_core::{
    BucketGrid, CalibrationCfg, CalibrationRecord, RegressionModel, StoreError, decode_record,
    encode_record,
};
use escapement_hardware::FileStore;
use escapement_traits::PersistentStore;
use eyre::WrapErr;

/// The record file these commands operate on. Unlike `simulate`, there is no
/// in-memory fallback.
pub struct RecordFile {
    store: FileStore,
    grid: BucketGrid,
}

impl RecordFile {
    pub fn open(cfg: &Config, path: Option<PathBuf>) -> eyre::Result<Self> {
        let path =
            path.ok_or_else(|| eyre::eyre!("no store path: pass --store or set [store].path"))?;
        let calibration: CalibrationCfg = (&cfg.calibration).into();
        Ok(Self {
            store: FileStore::new(path),
            grid: calibration.grid(),
        })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn load(&mut self) -> eyre::Result<CalibrationRecord> {
        let bytes = self
            .store
            .load()
            .map_err(|e| eyre::Report::new(StoreError::Unavailable(e.to_string())))?
            .ok_or_else(|| eyre::Report::new(StoreError::NotFound))?;
        decode_record(&bytes, Some(self.grid.steps))
            .map_err(eyre::Report::new)
            .wrap_err_with(|| format!("reading {}", self.path().display()))
    }

    /// Load, or start from an empty record when nothing is stored yet.
    pub fn load_or_new(&mut self) -> eyre::Result<CalibrationRecord> {
        match self.load() {
            Ok(r) => Ok(r),
            Err(e) if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::NotFound)) => {
                Ok(CalibrationRecord::new(self.grid.steps, false))
            }
            Err(e) => Err(e),
        }
    }

    pub fn save(&mut self, record: &CalibrationRecord) -> eyre::Result<()> {
        let bytes = encode_record(record).map_err(eyre::Report::new)?;
        self.store
            .save(&bytes)
            .map_err(|e| eyre::Report::new(StoreError::Unavailable(e.to_string())))
            .wrap_err_with(|| format!("writing {}", self.path().display()))?;
        tracing::info!(path = %self.path().display(), "calibration record saved");
        Ok(())
    }
}

pub fn show(file: &mut RecordFile, json: bool) -> eyre::Result<()> {
    let record = file.load()?;
    let model = RegressionModel::fit(&record, &file.grid);
    let mut out = std::io::stdout().lock();
    if json {
        let v = serde_json::json!({
            "clock_bias": record.clock_bias,
            "manual_adjust_us": record.manual_adjust,
            "temp_compensated": record.temp_compensated,
            "confirmed_buckets": record.confirmed_count(),
            "model": model.map(|m| serde_json::json!({
                "slope_us_per_c": m.slope,
                "intercept_us": m.intercept,
                "points": m.points,
            })),
            "buckets": bucket_rows(&record, &file.grid)
                .into_iter()
                .filter(|r| r.sample_count > 0)
                .collect::<Vec<_>>(),
        });
        writeln!(out, "{v}")?;
        return Ok(());
    }

    writeln!(out, "record:           {}", file.path().display())?;
    writeln!(out, "clock bias:       {} tenths of a second per day", record.clock_bias)?;
    writeln!(out, "manual adjust:    {} us per beat", record.manual_adjust)?;
    writeln!(out, "temp compensated: {}", record.temp_compensated)?;
    writeln!(
        out,
        "buckets:          {} confirmed of {}",
        record.confirmed_count(),
        record.buckets.len()
    )?;
    match model {
        Some(m) => writeln!(
            out,
            "model:            {:.3} us/°C, {:.1} us at 0 °C ({} points)",
            m.slope, m.intercept, m.points
        )?,
        None => writeln!(out, "model:            none")?,
    }
    for row in bucket_rows(&record, &file.grid)
        .iter()
        .filter(|r| r.sample_count > 0)
    {
        writeln!(
            out,
            "  #{:<3} {:>7.2} °C  {:>12.1} us  n={:<6} {:?}",
            row.bucket, row.temp_c, row.avg_duration_us, row.sample_count, row.status
        )?;
    }
    Ok(())
}

pub fn export(file: &mut RecordFile, csv: &Path) -> eyre::Result<()> {
    let record = file.load()?;
    write_bucket_csv(csv, &bucket_rows(&record, &file.grid))?;
    println!(
        "Exported {} buckets to {}",
        record.buckets.len(),
        csv.display()
    );
    Ok(())
}

/// Bucket statistics are replaced; bias and manual adjust are kept.
pub fn import(file: &mut RecordFile, csv: &Path) -> eyre::Result<()> {
    let rows = load_bucket_csv(csv)?;
    let mut record = file.load_or_new()?;
    apply_bucket_rows(&mut record, &rows)
        .wrap_err_with(|| format!("importing {}", csv.display()))?;
    file.save(&record)?;
    println!(
        "Imported {} buckets ({} confirmed) into {}",
        rows.len(),
        record.confirmed_count(),
        file.path().display()
    );
    Ok(())
}

pub fn reset(file: &mut RecordFile, keep_bias: bool) -> eyre::Result<()> {
    let bias = if keep_bias {
        file.load().map(|r| r.clock_bias).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "no usable record; bias resets to 0");
            0
        })
    } else {
        0
    };
    let mut record = CalibrationRecord::new(file.grid.steps, false);
    record.clock_bias = bias;
    file.save(&record)?;
    println!("Calibration cleared (clock bias {bias})");
    Ok(())
}

pub fn bias(file: &mut RecordFile, value: i32, relative: bool) -> eyre::Result<()> {
    let mut record = file.load_or_new()?;
    record.clock_bias = if relative {
        record.clock_bias.saturating_add(value)
    } else {
        value
    };
    file.save(&record)?;
    println!("Clock bias set to {}", record.clock_bias);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_path_is_an_error() {
        let err = RecordFile::open(&Config::default(), None)
            .err()
            .expect("no path");
        assert!(err.to_string().contains("no store path"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut file = RecordFile::open(&Config::default(), Some(dir.path().join("r.bin"))).unwrap();
        let err = file.load().unwrap_err();
        assert_eq!(err.downcast_ref::<StoreError>(), Some(&StoreError::NotFound));
        let fresh = file.load_or_new().unwrap();
        assert_eq!(fresh.buckets.len(), 50);
    }

    #[test]
    fn bias_is_relative_on_request() {
        let dir = tempdir().unwrap();
        let mut file = RecordFile::open(&Config::default(), Some(dir.path().join("r.bin"))).unwrap();
        bias(&mut file, 30, false).unwrap();
        bias(&mut file, -5, true).unwrap();
        assert_eq!(file.load().unwrap().clock_bias, 25);
    }
}

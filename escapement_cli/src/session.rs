//! Controller assembly from the config file and the shared beat loop.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use escapement_config::Config;
use escapement_core::runner::{self, RunSummary};
use escapement_core::{CalibrationCfg, Escapement, TimingCfg};
use escapement_hardware::{FileStore, MemoryStore};
use escapement_traits::{PersistentStore, TemperatureSensor, Transducer};
use eyre::WrapErr;

use crate::cli::StartArgs;

/// Record file from `--store`, else `[store].path`.
pub fn store_path(cfg: &Config, cli_store: Option<&PathBuf>) -> Option<PathBuf> {
    cli_store
        .cloned()
        .or_else(|| cfg.store.path.as_ref().map(PathBuf::from))
}

/// File-backed store when a path is known, otherwise one that forgets on exit.
pub fn open_store(path: Option<PathBuf>) -> Box<dyn PersistentStore> {
    match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "using file store");
            Box::new(FileStore::new(p))
        }
        None => {
            tracing::info!("no store path configured; calibration is kept in memory only");
            Box::new(MemoryStore::new())
        }
    }
}

/// Build the controller using the From impls in escapement_core::conversions.
pub fn assemble(
    cfg: &Config,
    transducer: impl Transducer + 'static,
    sensor: Option<Box<dyn TemperatureSensor>>,
    store: Box<dyn PersistentStore>,
) -> eyre::Result<Escapement> {
    let calibration: CalibrationCfg = (&cfg.calibration).into();
    let timing: TimingCfg = (&cfg.timing).into();
    let mut builder = Escapement::builder()
        .with_transducer(transducer)
        .with_store(store)
        .with_calibration(calibration)
        .with_timing(timing);
    if let Some(sensor) = sensor {
        builder = builder.with_sensor(sensor);
    }
    builder.build().wrap_err("building escapement")
}

/// Enable the controller and beat until done, printing per-beat JSON lines in
/// JSON mode or mode transitions otherwise. `before_beat` runs ahead of each
/// passage with the number of passages processed so far.
pub fn drive(
    esc: &mut Escapement,
    start: &StartArgs,
    json: bool,
    shutdown: &Arc<AtomicBool>,
    mut before_beat: impl FnMut(u64),
) -> eyre::Result<RunSummary> {
    esc.enable(start.initial_mode());
    let mut out = std::io::stdout().lock();
    if !json {
        writeln!(
            out,
            "Starting in {} (compensated: {})",
            esc.mode(),
            esc.is_temp_compensated()
        )?;
    }

    let mut seen = 0u64;
    before_beat(seen);
    let summary = runner::run(
        esc,
        start.beats,
        || shutdown.load(Ordering::Relaxed),
        |report, core| {
            seen += 1;
            if json {
                let line = serde_json::to_string(report)
                    .map_err(|e| eyre::eyre!("encoding beat report: {e}"))?;
                writeln!(out, "{line}")?;
            } else if report.mode_after != report.mode_before {
                writeln!(
                    out,
                    "beat {seen}: {} -> {} (bpm {:.3})",
                    report.mode_before,
                    report.mode_after,
                    core.bpm_last_beat()
                )?;
            }
            before_beat(seen);
            Ok(())
        },
    )?;
    Ok(summary)
}

/// Final line for a finished run.
pub fn print_summary(label: &str, summary: &RunSummary, esc: &Escapement, json: bool) -> eyre::Result<()> {
    let mut out = std::io::stdout().lock();
    if json {
        let v = serde_json::json!({
            "summary": {
                "passages": summary.passages,
                "accepted": summary.accepted,
                "rejected": summary.rejected,
                "mode_changes": summary.mode_changes,
                "final_mode": summary.final_mode,
                "bpm_model": summary.bpm_model,
                "confirmed_buckets": esc.record().confirmed_count(),
                "clock_bias": esc.clock_bias(),
                "manual_adjust_us": esc.manual_adjust(),
            }
        });
        writeln!(out, "{v}")?;
    } else {
        writeln!(
            out,
            "{label}: {} passages ({} accepted, {} rejected), final mode {}, model {:.3} bpm, {} confirmed buckets",
            summary.passages,
            summary.accepted,
            summary.rejected,
            summary.final_mode,
            summary.bpm_model,
            esc.record().confirmed_count()
        )?;
    }
    Ok(())
}

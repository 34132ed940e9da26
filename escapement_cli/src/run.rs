//! `run`: the controller on the Raspberry Pi coil and TMP102.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use escapement_config::Config;
use escapement_hardware::{CoilTransducer, Tmp102};
use escapement_traits::{MonotonicClock, TemperatureSensor};
use eyre::WrapErr;

use crate::cli::StartArgs;
use crate::session;

pub fn run_hardware(
    cfg: &Config,
    start: &StartArgs,
    store: Option<PathBuf>,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    let pins = cfg
        .pins
        .ok_or_else(|| eyre::eyre!("invalid configuration: [pins] section is missing"))?;
    let coil = CoilTransducer::new(pins.sense, pins.kick, MonotonicClock::new())
        .wrap_err("open coil pins")?;
    tracing::info!(sense = pins.sense, kick = pins.kick, "coil ready");

    let sensor: Option<Box<dyn TemperatureSensor>> = match Tmp102::new(cfg.hardware.tmp102_address) {
        Ok(t) => Some(Box::new(t)),
        Err(e) => {
            tracing::warn!(error = %e, "TMP102 unavailable; running uncompensated");
            None
        }
    };

    let mut esc = session::assemble(cfg, coil, sensor, session::open_store(store))?;
    let summary = session::drive(&mut esc, start, json, shutdown, |_| {})?;
    session::print_summary("Run stopped", &summary, &esc, json)
}

//! `simulate`: the controller against a model bendulum and thermometer.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use escapement_config::{Config, SimulationSection};
use escapement_hardware::{OscillatorParams, SharedTemperature, SimulatedOscillator, SimulatedThermometer};
use escapement_traits::{Clock, MonotonicClock, TemperatureSensor, VirtualClock};

use crate::cli::StartArgs;
use crate::session;

pub struct SimulateOpts<'a> {
    pub start: &'a StartArgs,
    pub temp_end: Option<f32>,
    pub realtime: bool,
    pub store: Option<PathBuf>,
    pub json: bool,
}

/// The configured period applies at the starting temperature.
fn oscillator_params(s: &SimulationSection) -> OscillatorParams {
    OscillatorParams {
        period_us: s.period_us,
        temp_coeff_us_per_c: s.temp_coeff_us_per_c,
        reference_temp_c: f64::from(s.temperature_c),
        jitter_us: s.jitter_us,
        reference_bias: s.reference_bias,
        seed: s.seed,
    }
}

/// Temperature at passage `i` of `n` when ramping from `from` to `to`.
fn ramp(from: f32, to: f32, i: u64, n: u64) -> f32 {
    if n <= 1 {
        return from;
    }
    let t = (i.min(n - 1) as f64) / ((n - 1) as f64);
    (f64::from(from) + (f64::from(to) - f64::from(from)) * t) as f32
}

pub fn run_simulation(
    cfg: &Config,
    opts: &SimulateOpts<'_>,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    if opts.realtime || cfg.simulation.realtime {
        simulate_with(cfg, opts, shutdown, MonotonicClock::new())
    } else {
        simulate_with(cfg, opts, shutdown, VirtualClock::new())
    }
}

fn simulate_with<C: Clock + 'static>(
    cfg: &Config,
    opts: &SimulateOpts<'_>,
    shutdown: &Arc<AtomicBool>,
    clock: C,
) -> eyre::Result<()> {
    let sim = &cfg.simulation;
    let temperature = SharedTemperature::new(sim.temperature_c);
    let oscillator = SimulatedOscillator::new(oscillator_params(sim), clock, temperature.clone());
    let sensor: Option<Box<dyn TemperatureSensor>> = sim
        .sensor
        .then(|| Box::new(SimulatedThermometer::new(temperature.clone())) as Box<dyn TemperatureSensor>);
    tracing::info!(
        period_us = sim.period_us,
        temp_c = sim.temperature_c,
        sensor = sim.sensor,
        reference_bias = sim.reference_bias,
        "starting simulation"
    );

    let store = session::open_store(opts.store.clone());
    let mut esc = session::assemble(cfg, oscillator, sensor, store)?;

    let (from, n) = (sim.temperature_c, opts.start.beats.unwrap_or(0));
    let summary = session::drive(&mut esc, opts.start, opts.json, shutdown, |i| {
        if let Some(to) = opts.temp_end {
            temperature.set_celsius(ramp(from, to, i, n));
        }
    })?;
    session::print_summary("Simulation complete", &summary, &esc, opts.json)
}

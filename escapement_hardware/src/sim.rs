//! Simulated oscillator and thermometer.
//!
//! The oscillator's period follows a linear temperature law and is measured
//! against a reference clock that under-counts by `reference_bias` tenths of a
//! second per day, so the core's bias correction has something to undo.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use escapement_traits::{BoxError, Clock, TemperatureSensor, Transducer, celsius_to_c256};

use crate::error::HwError;

/// Tenths of a second in a day times the microsecond scaling used by the
/// reference bias.
const BIAS_SCALE: f64 = 864_000.0;

/// Temperature shared between the simulated oscillator and thermometer.
#[derive(Debug, Clone)]
pub struct SharedTemperature {
    c256: Arc<AtomicI32>,
    available: Arc<AtomicBool>,
}

impl SharedTemperature {
    pub fn new(celsius: f32) -> Self {
        Self {
            c256: Arc::new(AtomicI32::new(celsius_to_c256(celsius))),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_celsius(&self, celsius: f32) {
        self.c256.store(celsius_to_c256(celsius), Ordering::Relaxed);
    }

    pub fn celsius(&self) -> f32 {
        self.c256() as f32 / 256.0
    }

    pub fn c256(&self) -> i32 {
        self.c256.load(Ordering::Relaxed)
    }

    /// Make the thermometer report failures (or recover).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}

impl Default for SharedTemperature {
    fn default() -> Self {
        Self::new(20.0)
    }
}

/// Physical parameters of the simulated bendulum.
#[derive(Debug, Clone)]
pub struct OscillatorParams {
    /// True beat duration at `reference_temp_c`, microseconds.
    pub period_us: f64,
    /// Change of the beat duration per degree Celsius, microseconds.
    pub temp_coeff_us_per_c: f64,
    pub reference_temp_c: f64,
    /// Peak uniform jitter added to each beat, microseconds.
    pub jitter_us: f64,
    /// Reference clock error in tenths of a second per day; positive means the
    /// reference clock under-counts.
    pub reference_bias: i32,
    /// PRNG seed for the jitter.
    pub seed: u32,
}

impl Default for OscillatorParams {
    fn default() -> Self {
        Self {
            period_us: 500_000.0,
            temp_coeff_us_per_c: 0.0,
            reference_temp_c: 20.0,
            jitter_us: 0.0,
            reference_bias: 0,
            seed: 0x5eed,
        }
    }
}

/// Transducer backed by a model oscillator and a [`Clock`].
///
/// Each `await_passage` sleeps on the clock for one beat, so a
/// [`escapement_traits::VirtualClock`] gives instant deterministic runs and a
/// [`escapement_traits::MonotonicClock`] runs in real time.
pub struct SimulatedOscillator<C: Clock> {
    params: OscillatorParams,
    clock: C,
    temperature: SharedTemperature,
    rng: u32,
    missed: u32,
    kicks: u64,
}

impl<C: Clock> SimulatedOscillator<C> {
    pub fn new(params: OscillatorParams, clock: C, temperature: SharedTemperature) -> Self {
        let rng = params.seed.max(1);
        Self {
            params,
            clock,
            temperature,
            rng,
            missed: 0,
            kicks: 0,
        }
    }

    /// Drop the next `n` detections, as a noisy coil would.
    pub fn miss_passages(&mut self, n: u32) {
        self.missed = self.missed.saturating_add(n);
    }

    /// Number of kicks delivered so far.
    pub fn kicks(&self) -> u64 {
        self.kicks
    }

    /// True beat duration at the current temperature, without jitter.
    pub fn nominal_beat_us(&self) -> f64 {
        let dt = f64::from(self.temperature.celsius()) - self.params.reference_temp_c;
        self.params.period_us + self.params.temp_coeff_us_per_c * dt
    }

    fn next_jitter(&mut self) -> f64 {
        if self.params.jitter_us == 0.0 {
            return 0.0;
        }
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let unit = f64::from(x) / (f64::from(u32::MAX) + 1.0);
        (unit * 2.0 - 1.0) * self.params.jitter_us
    }

    fn reference_reading(&self) -> u64 {
        let true_us = self.clock.now_us() as f64;
        let scale = BIAS_SCALE / (BIAS_SCALE + f64::from(self.params.reference_bias));
        (true_us * scale).round() as u64
    }
}

impl<C: Clock> Transducer for SimulatedOscillator<C> {
    fn await_passage(&mut self) -> Result<u64, BoxError> {
        let beats = 1 + std::mem::take(&mut self.missed);
        for _ in 0..beats {
            let beat_us = (self.nominal_beat_us() + self.next_jitter()).max(1.0);
            self.clock.sleep(Duration::from_nanos((beat_us * 1_000.0) as u64));
        }
        let ts = self.reference_reading();
        tracing::trace!(ts, "simulated passage");
        Ok(ts)
    }

    fn apply_kick(&mut self) -> Result<(), BoxError> {
        self.kicks = self.kicks.saturating_add(1);
        Ok(())
    }
}

/// Thermometer reading a [`SharedTemperature`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedThermometer {
    temperature: SharedTemperature,
}

impl SimulatedThermometer {
    pub fn new(temperature: SharedTemperature) -> Self {
        Self { temperature }
    }
}

impl TemperatureSensor for SimulatedThermometer {
    fn read(&mut self) -> Result<i32, BoxError> {
        if !self.temperature.is_available() {
            return Err(Box::new(HwError::SensorUnavailable));
        }
        Ok(self.temperature.c256())
    }
}

//! Type-state builder for `Escapement` and generic `build_escapement` constructor.
//!
//! The transducer is the only mandatory collaborator and `build()` is only
//! available once it is set. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;

use escapement_traits::{PersistentStore, TemperatureSensor, Transducer};

use crate::config::{CalibrationCfg, TimingCfg};
use crate::controller::EscapementCore;
use crate::error::{BuildError, Result};
use crate::record::CalibrationRecord;

/// Dynamically dispatched controller over boxed collaborators.
pub type Escapement = EscapementCore<
    Box<dyn Transducer>,
    Box<dyn TemperatureSensor>,
    Box<dyn PersistentStore>,
>;

impl Escapement {
    /// Start building an Escapement.
    pub fn builder() -> EscapementBuilder<Missing> {
        EscapementBuilder::default()
    }
}

impl std::fmt::Debug for Escapement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Escapement")
            .field("mode", &self.mode)
            .field("enabled", &self.enabled)
            .field("temp_compensated", &self.record.temp_compensated)
            .field("clock_bias", &self.record.clock_bias)
            .field("manual_adjust", &self.record.manual_adjust)
            .field("last_duration_us", &self.last_duration_us)
            .finish()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Escapement`. All fields are validated on `build()`.
pub struct EscapementBuilder<T> {
    transducer: Option<Box<dyn Transducer>>,
    sensor: Option<Box<dyn TemperatureSensor>>,
    store: Option<Box<dyn PersistentStore>>,
    calibration: Option<CalibrationCfg>,
    timing: Option<TimingCfg>,
    record: Option<CalibrationRecord>,
    _t: PhantomData<T>,
}

impl Default for EscapementBuilder<Missing> {
    fn default() -> Self {
        Self {
            transducer: None,
            sensor: None,
            store: None,
            calibration: None,
            timing: None,
            record: None,
            _t: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and construct an `EscapementCore`.
///
/// Shared by `EscapementBuilder::try_build()` and `build_escapement()`.
fn validate_and_build<T, S, P>(
    transducer: T,
    sensor: Option<S>,
    store: Option<P>,
    calibration: CalibrationCfg,
    timing: TimingCfg,
    record: Option<CalibrationRecord>,
) -> Result<EscapementCore<T, S, P>>
where
    T: Transducer,
    S: TemperatureSensor,
    P: PersistentStore,
{
    if calibration.temp_steps == 0 {
        return Err(invalid("temp_steps must be >= 1"));
    }
    if calibration.temp_steps > 400 {
        return Err(invalid("temp_steps must be <= 400"));
    }
    if !(-60..=120).contains(&calibration.temp_min_c) {
        return Err(invalid("temp_min_c out of range"));
    }
    if calibration.warmup_beats == 0 {
        return Err(invalid("warmup_beats must be >= 1"));
    }
    if calibration.target_samples == 0 {
        return Err(invalid("target_samples must be >= 1"));
    }
    if !(1..=64).contains(&calibration.capture_window_c256) {
        return Err(invalid("capture window must be within a quarter degree"));
    }
    if timing.max_beat_us <= 0 {
        return Err(invalid("max_beat_us must be > 0"));
    }
    if record
        .as_ref()
        .is_some_and(|r| r.buckets.len() != calibration.temp_steps)
    {
        return Err(invalid("initial record bucket count must equal temp_steps"));
    }
    Ok(EscapementCore::assemble(
        transducer,
        sensor,
        store,
        calibration,
        timing,
        record,
    ))
}

impl<T> EscapementBuilder<T> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Escapement> {
        let transducer = self
            .transducer
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransducer))?;
        validate_and_build(
            transducer,
            self.sensor,
            self.store,
            self.calibration.unwrap_or_default(),
            self.timing.unwrap_or_default(),
            self.record,
        )
    }

    /// Attach a temperature sensor. Without one the controller runs uncompensated.
    pub fn with_sensor(mut self, sensor: impl TemperatureSensor + 'static) -> Self {
        self.sensor = Some(Box::new(sensor));
        self
    }

    /// Attach a persistent store. Without one nothing survives a restart.
    pub fn with_store(mut self, store: impl PersistentStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Start from this record instead of the store's contents.
    pub fn with_record(mut self, record: CalibrationRecord) -> Self {
        self.record = Some(record);
        self
    }
}

impl EscapementBuilder<Missing> {
    pub fn with_transducer(
        self,
        transducer: impl Transducer + 'static,
    ) -> EscapementBuilder<Set> {
        EscapementBuilder {
            transducer: Some(Box::new(transducer)),
            sensor: self.sensor,
            store: self.store,
            calibration: self.calibration,
            timing: self.timing,
            record: self.record,
            _t: PhantomData,
        }
    }
}

impl EscapementBuilder<Set> {
    /// Validate and build. Only available once the transducer is set.
    pub fn build(self) -> Result<Escapement> {
        self.try_build()
    }
}

/// Build a statically dispatched controller from concrete collaborators.
pub fn build_escapement<T, S, P>(
    transducer: T,
    sensor: Option<S>,
    store: Option<P>,
    calibration: Option<CalibrationCfg>,
    timing: Option<TimingCfg>,
    record: Option<CalibrationRecord>,
) -> Result<EscapementCore<T, S, P>>
where
    T: Transducer,
    S: TemperatureSensor,
    P: PersistentStore,
{
    validate_and_build(
        transducer,
        sensor,
        store,
        calibration.unwrap_or_default(),
        timing.unwrap_or_default(),
        record,
    )
}

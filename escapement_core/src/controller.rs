//! The escapement controller (`EscapementCore`).
//!
//! Each call to [`EscapementCore::beat`] waits for one passage of the magnet,
//! kicks the oscillator, measures the interval since the previous passage,
//! corrects it for reference clock bias and runs it through the calibration
//! state machine in [`crate::mode`].

use escapement_traits::{PersistentStore, TemperatureSensor, Transducer};
use eyre::WrapErr;

use crate::config::{CalibrationCfg, TimingCfg};
use crate::error::{EscapementError, Result};
use crate::fixed_point::{c256_to_celsius, correct_for_bias, tenths_per_day_to_us};
use crate::hw_error::map_hw_error;
use crate::mode::{CalibrationView, Observation, RecordDelta, RunMode, Step, next_step};
use crate::record::{BucketGrid, CalibrationRecord, RECORD_TAG, TempSlot};
use crate::regression::RegressionModel;
use crate::status::{BeatOutcome, BeatReport};
use crate::store::{CalibrationStore, StoreError};
use crate::util::bpm;

/// Unified core for both dynamic (boxed) and generic (static dispatch) variants.
pub struct EscapementCore<T, S, P> {
    pub(crate) transducer: T,
    pub(crate) sensor: Option<S>,
    pub(crate) store: CalibrationStore<P>,
    /// Used in place of the store's contents at enable when set.
    pub(crate) initial_record: Option<CalibrationRecord>,
    pub(crate) cfg: CalibrationCfg,
    pub(crate) timing: TimingCfg,
    pub(crate) grid: BucketGrid,

    pub(crate) record: CalibrationRecord,
    pub(crate) model: Option<RegressionModel>,
    pub(crate) calibration_changed: bool,

    pub(crate) enabled: bool,
    pub(crate) mode: RunMode,
    pub(crate) phase_counter: u32,
    pub(crate) slot: TempSlot,
    pub(crate) last_ts: Option<u64>,
    pub(crate) prev_ts: Option<u64>,
    pub(crate) next_is_tick: bool,
    pub(crate) last_was_tick: bool,
    pub(crate) last_tick_us: i64,
    pub(crate) last_tock_us: i64,
    pub(crate) last_duration_us: i64,
    pub(crate) beats: u64,
    pub(crate) rejected: u64,
}

impl<T, S, P> EscapementCore<T, S, P>
where
    T: Transducer,
    S: TemperatureSensor,
    P: PersistentStore,
{
    pub(crate) fn assemble(
        transducer: T,
        sensor: Option<S>,
        store: Option<P>,
        cfg: CalibrationCfg,
        timing: TimingCfg,
        initial_record: Option<CalibrationRecord>,
    ) -> Self {
        let grid = cfg.grid();
        let record = CalibrationRecord::new(grid.steps, sensor.is_some());
        Self {
            transducer,
            sensor,
            store: CalibrationStore::new(store, grid.steps),
            initial_record,
            cfg,
            timing,
            grid,
            record,
            model: None,
            calibration_changed: false,
            enabled: false,
            mode: RunMode::ColdStart,
            phase_counter: 0,
            slot: TempSlot::Unavailable,
            last_ts: None,
            prev_ts: None,
            next_is_tick: true,
            last_was_tick: false,
            last_tick_us: 0,
            last_tock_us: 0,
            last_duration_us: 0,
            beats: 0,
            rejected: 0,
        }
    }

    /// Start operation.
    ///
    /// `Some(ColdStart)` discards any stored calibration. Otherwise the stored
    /// record (or the builder's initial record) is loaded; a missing or
    /// unreadable record means a cold start.
    /// A record made with different sensor availability than now always
    /// means recalibration. Otherwise `None` warm starts and any other
    /// explicit mode is entered directly on top of the loaded record.
    pub fn enable(&mut self, initial: Option<RunMode>) {
        self.enabled = true;
        self.last_ts = None;
        self.prev_ts = None;
        self.next_is_tick = true;
        self.last_was_tick = false;
        self.last_duration_us = 0;
        self.slot = TempSlot::Unavailable;

        if initial == Some(RunMode::ColdStart) {
            self.enter(RunMode::ColdStart);
            return;
        }
        let loaded = match &self.initial_record {
            Some(record) => Ok(record.clone()),
            None => self.store.load(),
        };
        match loaded {
            Ok(record) => {
                self.record = record;
                self.model = None;
                self.calibration_changed = false;
                let sensor_ok = self.probe_sensor();
                let mode = if self.record.temp_compensated != sensor_ok {
                    if let Some(requested) = initial {
                        tracing::info!(
                            %requested,
                            "sensor availability changed; recalibrating instead"
                        );
                    }
                    RunMode::CalStart
                } else {
                    initial.unwrap_or(RunMode::WarmStart)
                };
                tracing::info!(
                    clock_bias = self.record.clock_bias,
                    confirmed = self.record.confirmed_count(),
                    temp_compensated = self.record.temp_compensated,
                    "calibration record loaded"
                );
                self.enter(mode);
            }
            Err(StoreError::NotFound) => {
                tracing::info!("no calibration record stored; cold start");
                self.enter(RunMode::ColdStart);
            }
            Err(e) => {
                tracing::warn!(error = %e, "calibration record unusable; cold start");
                self.enter(RunMode::ColdStart);
            }
        }
    }

    /// Process one passage and return the beat duration in microseconds.
    ///
    /// Returns 0 for the first detection after enable and for rejected
    /// intervals. Only a failed passage wait is an error.
    pub fn beat(&mut self) -> Result<i64> {
        self.beat_report().map(|r| r.duration_us)
    }

    /// Two consecutive beats (a tick and a tock); returns their sum.
    pub fn cycle(&mut self) -> Result<i64> {
        let first = self.beat()?;
        let second = self.beat()?;
        Ok(first.saturating_add(second))
    }

    /// Like [`beat`](Self::beat) but with the full per-beat report.
    pub fn beat_report(&mut self) -> Result<BeatReport> {
        if !self.enabled {
            return Err(eyre::Report::new(EscapementError::State(
                "beat() before enable()".into(),
            )));
        }
        let ts = self
            .transducer
            .await_passage()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("awaiting passage")?;
        if let Err(e) = self.transducer.apply_kick() {
            tracing::warn!(error = %e, "kick failed");
        }

        let mode_before = self.mode;
        let Some(prev) = self.last_ts.replace(ts) else {
            tracing::debug!(ts, "first passage");
            return Ok(BeatReport {
                outcome: BeatOutcome::First,
                duration_us: 0,
                measured_us: 0,
                mode_before,
                mode_after: mode_before,
                temperature_c: self.temperature_c(),
                tick: false,
            });
        };
        self.prev_ts = Some(prev);

        let tick = self.next_is_tick;
        self.next_is_tick = !tick;
        self.last_was_tick = tick;

        let raw = i64::try_from(ts.wrapping_sub(prev)).unwrap_or(i64::MAX);
        let measured = correct_for_bias(raw, self.record.clock_bias);
        if measured <= 0 || measured > self.timing.max_beat_us {
            self.rejected += 1;
            self.last_duration_us = 0;
            tracing::debug!(raw, measured, "beat rejected");
            return Ok(BeatReport {
                outcome: BeatOutcome::Rejected,
                duration_us: 0,
                measured_us: measured,
                mode_before,
                mode_after: mode_before,
                temperature_c: self.temperature_c(),
                tick,
            });
        }

        self.refresh_slot();
        let step = next_step(
            self.mode,
            &Observation {
                measured_us: measured,
                slot: self.slot,
                phase_counter: self.phase_counter,
            },
            &self.view(),
        );
        self.apply(step);

        if tick {
            self.last_tick_us = measured;
        } else {
            self.last_tock_us = measured;
        }
        self.last_duration_us = step.duration_us;
        self.beats += 1;
        tracing::debug!(measured, duration = step.duration_us, mode = %self.mode, "beat");

        Ok(BeatReport {
            outcome: BeatOutcome::Accepted,
            duration_us: step.duration_us,
            measured_us: measured,
            mode_before,
            mode_after: self.mode,
            temperature_c: self.temperature_c(),
            tick,
        })
    }

    fn view(&self) -> CalibrationView<'_> {
        CalibrationView {
            record: &self.record,
            model: self.model.as_ref(),
            cfg: &self.cfg,
            grid: &self.grid,
            calibration_changed: self.calibration_changed,
        }
    }

    fn apply(&mut self, step: Step) {
        match step.delta {
            RecordDelta::None => {}
            RecordDelta::Fold {
                bucket,
                duration_us,
            } => {
                let target = self.cfg.target_samples;
                let confirmed = self
                    .record
                    .bucket_mut(bucket)
                    .is_some_and(|b| b.fold(duration_us, target));
                if confirmed {
                    tracing::info!(
                        bucket,
                        temp_c = self.grid.center_c(bucket),
                        "bucket confirmed"
                    );
                    self.calibration_changed = true;
                    self.persist();
                }
            }
            RecordDelta::Rebuild { reset_adjust } => {
                self.model = RegressionModel::fit(&self.record, &self.grid);
                self.calibration_changed = false;
                if let Some(m) = &self.model {
                    tracing::info!(
                        slope = m.slope,
                        intercept = m.intercept,
                        points = m.points,
                        "model built"
                    );
                }
                if reset_adjust && self.record.manual_adjust != 0 {
                    tracing::info!(
                        previous = self.record.manual_adjust,
                        "calibration changed; manual adjust cleared"
                    );
                    self.record.manual_adjust = 0;
                    self.persist();
                }
            }
        }
        if step.next == self.mode {
            self.phase_counter = self.phase_counter.saturating_add(1);
        } else {
            self.enter(step.next);
        }
    }

    /// Switch mode and run its entry actions.
    fn enter(&mut self, mode: RunMode) {
        let from = self.mode;
        self.mode = mode;
        self.phase_counter = 0;
        match mode {
            RunMode::ColdStart => {
                let compensated = self.probe_sensor();
                self.record = CalibrationRecord::new(self.grid.steps, compensated);
                self.model = None;
                self.calibration_changed = false;
            }
            RunMode::CalStart => {
                self.record.clear_buckets();
                self.record.manual_adjust = 0;
                self.record.temp_compensated = self.probe_sensor();
                self.model = None;
                self.calibration_changed = false;
                self.persist();
            }
            RunMode::WarmStart
            | RunMode::Collect
            | RunMode::Model
            | RunMode::Run
            | RunMode::CalRtc => {}
        }
        tracing::info!(%from, to = %mode, "mode change");
    }

    /// Whether a sensor is attached and currently answering.
    fn probe_sensor(&mut self) -> bool {
        let Some(sensor) = self.sensor.as_mut() else {
            return false;
        };
        match sensor.read() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "temperature sensor not responding");
                false
            }
        }
    }

    fn refresh_slot(&mut self) {
        if !self.record.temp_compensated {
            self.slot = TempSlot::Fixed;
            return;
        }
        let Some(sensor) = self.sensor.as_mut() else {
            self.slot = TempSlot::Unavailable;
            return;
        };
        match sensor.read() {
            Ok(c256) => self.slot = self.grid.slot_for(c256),
            Err(e) => {
                if self.slot == TempSlot::Unavailable {
                    tracing::debug!(error = %e, "temperature read failed");
                } else {
                    tracing::warn!(error = %e, "temperature read failed");
                }
                self.slot = TempSlot::Unavailable;
            }
        }
    }

    /// Best-effort save. The in-memory record is tagged valid only when the
    /// store accepted it.
    fn persist(&mut self) {
        if !self.store.has_backend() {
            return;
        }
        match self.store.save(&self.record) {
            Ok(()) => self.record.valid_tag = RECORD_TAG,
            Err(e) => tracing::warn!(error = %e, "calibration record not saved"),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the most recent beat was a tick.
    pub fn is_tick(&self) -> bool {
        self.last_was_tick
    }

    pub fn is_temp_compensated(&self) -> bool {
        self.record.temp_compensated
    }

    /// Last temperature reading, or `None` when uncompensated or unavailable.
    pub fn temperature_c(&self) -> Option<f32> {
        self.slot.c256().map(c256_to_celsius)
    }

    /// Bucket the last reading fell in.
    pub fn temp_slot(&self) -> TempSlot {
        self.slot
    }

    /// Last tick duration over last tock duration; 0 until both are known.
    pub fn tick_tock_ratio(&self) -> f32 {
        if self.last_tick_us <= 0 || self.last_tock_us <= 0 {
            return 0.0;
        }
        (self.last_tick_us as f64 / self.last_tock_us as f64) as f32
    }

    /// Rate implied by the model at the current temperature, manual adjust
    /// included; 0 without a model.
    pub fn bpm_model(&self) -> f32 {
        self.view()
            .predicted_us(&self.slot)
            .map_or(0.0, |us| bpm(us as f64))
    }

    /// Rate implied by the last measured interval plus manual adjust.
    pub fn bpm_measured(&self) -> f32 {
        match (self.prev_ts, self.last_ts) {
            (Some(prev), Some(last)) => {
                let raw = i64::try_from(last.wrapping_sub(prev)).unwrap_or(i64::MAX);
                let corrected = correct_for_bias(raw, self.record.clock_bias);
                bpm(corrected.saturating_add(self.record.manual_adjust) as f64)
            }
            _ => 0.0,
        }
    }

    /// Rate of the duration last returned from `beat`.
    pub fn bpm_last_beat(&self) -> f32 {
        bpm(self.last_duration_us as f64)
    }

    /// Progress through the current phase: samples in the current bucket while
    /// collecting, beats in mode otherwise, `None` while running.
    pub fn phase_count(&self) -> Option<u32> {
        match self.mode {
            RunMode::Run => None,
            RunMode::Collect => Some(
                self.slot
                    .index()
                    .and_then(|i| self.record.bucket(i))
                    .map_or(0, |b| b.sample_count),
            ),
            _ => Some(self.phase_counter),
        }
    }

    pub fn clock_bias(&self) -> i32 {
        self.record.clock_bias
    }

    pub fn manual_adjust(&self) -> i64 {
        self.record.manual_adjust
    }

    /// Duration last returned from `beat`, microseconds.
    pub fn beat_duration(&self) -> i64 {
        self.last_duration_us
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    pub fn model(&self) -> Option<&RegressionModel> {
        self.model.as_ref()
    }

    pub fn grid(&self) -> &BucketGrid {
        &self.grid
    }

    /// Accepted beats since construction.
    pub fn accepted_beats(&self) -> u64 {
        self.beats
    }

    /// Rejected intervals since construction.
    pub fn rejected_beats(&self) -> u64 {
        self.rejected
    }

    pub fn transducer(&self) -> &T {
        &self.transducer
    }

    pub fn transducer_mut(&mut self) -> &mut T {
        &mut self.transducer
    }

    // ── Mutators (persisted) ─────────────────────────────────────────────────

    pub fn set_clock_bias(&mut self, bias: i32) {
        self.record.clock_bias = bias;
        tracing::info!(bias, "clock bias set");
        self.persist();
    }

    /// Add `delta` tenths of a second per day to the clock bias.
    pub fn incr_clock_bias(&mut self, delta: i32) -> i32 {
        let bias = self.record.clock_bias.saturating_add(delta);
        self.set_clock_bias(bias);
        bias
    }

    pub fn set_manual_adjust(&mut self, adjust_us: i64) {
        self.record.manual_adjust = adjust_us;
        tracing::info!(adjust_us, "manual adjust set");
        self.persist();
    }

    /// Shift the rate by `tenths` tenths of a second per day, converted to
    /// microseconds through the current beat duration.
    pub fn incr_manual_adjust(&mut self, tenths: i32) -> i64 {
        let beat_us = self
            .view()
            .predicted_us(&self.slot)
            .unwrap_or(self.last_duration_us);
        let delta = tenths_per_day_to_us(beat_us, tenths);
        let adjust = self.record.manual_adjust.saturating_add(delta);
        self.set_manual_adjust(adjust);
        adjust
    }

    /// Force a mode and run its entry actions, then persist the record.
    pub fn set_mode(&mut self, mode: RunMode) {
        self.enter(mode);
        // cold start discards the record; calstart already saved it
        if !matches!(mode, RunMode::ColdStart | RunMode::CalStart) {
            self.persist();
        }
    }
}

#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Escapement timekeeping core (hardware-agnostic).
//!
//! Turns passages of a free-swinging oscillator past a sense coil into beat
//! durations that keep time. All hardware goes through the
//! `escapement_traits` collaborators.
//!
//! ## Architecture
//!
//! - **Record**: per-temperature bucket statistics that survive power cycles (`record`, `store`)
//! - **Model**: least-squares temperature model and RUN-mode policies (`regression`)
//! - **Modes**: pure per-beat transition function (`mode`)
//! - **Controller**: beat pipeline, entry actions, persistence (`controller`)
//!
//! ## Units
//!
//! Durations are `i64` microseconds of the reference clock after bias
//! correction. Temperatures are °C × 256 internally and `f32` °C at the API.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod fixed_point;
pub mod hw_error;
pub mod mocks;
pub mod mode;
pub mod record;
pub mod regression;
pub mod runner;
pub mod status;
pub mod store;
pub mod util;

pub use builder::{Escapement, EscapementBuilder, Missing, Set, build_escapement};
pub use config::{CalibrationCfg, ModelPolicy, TimingCfg};
pub use controller::EscapementCore;
pub use error::{BuildError, EscapementError, Report, Result};
pub use mode::RunMode;
pub use record::{BucketGrid, BucketStatus, CalibrationRecord, TempSlot, TemperatureBucket};
pub use regression::RegressionModel;
pub use status::{BeatOutcome, BeatReport};
pub use store::{StoreError, decode_record, encode_record};

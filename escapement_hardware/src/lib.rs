//! Hardware backends for the escapement collaborators.
//!
//! Simulated backends are always available; the Raspberry Pi coil and TMP102
//! drivers are compiled with the `hardware` feature on Linux.

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod coil;
pub mod error;
pub mod sim;
pub mod store;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod tmp102;
pub mod util;

pub use error::HwError;
pub use sim::{OscillatorParams, SharedTemperature, SimulatedOscillator, SimulatedThermometer};
pub use store::{FileStore, MemoryStore};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use coil::CoilTransducer;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use tmp102::Tmp102;

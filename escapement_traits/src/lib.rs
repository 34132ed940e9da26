//! Collaborator contracts consumed by the escapement controller.
//!
//! Every trait reports failures as `Box<dyn Error + Send + Sync>` so backends
//! can surface their own error types; the core maps them at the boundary.

pub mod clock;

pub use clock::{Clock, MonotonicClock, VirtualClock};

/// Boxed error type used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sense-and-kick coil attached to the oscillator.
pub trait Transducer {
    /// Block until the magnet passes the coil and return the reference-clock
    /// timestamp of the passage in microseconds.
    fn await_passage(&mut self) -> Result<u64, BoxError>;

    /// Emit the fixed-duration corrective pulse. May block for the pulse length.
    fn apply_kick(&mut self) -> Result<(), BoxError>;
}

/// Temperature probe read in fixed point: degrees Celsius × 256.
pub trait TemperatureSensor {
    fn read(&mut self) -> Result<i32, BoxError>;
}

/// Convert a Celsius value to the sensor scale (°C × 256).
#[inline]
pub fn celsius_to_c256(c: f32) -> i32 {
    (c * 256.0).round() as i32
}

#[inline]
pub fn c256_to_celsius(c256: i32) -> f32 {
    c256 as f32 / 256.0
}

/// Fixed-size binary blob that survives power cycling.
pub trait PersistentStore {
    /// `Ok(None)` when nothing has ever been written.
    fn load(&mut self) -> Result<Option<Vec<u8>>, BoxError>;
    fn save(&mut self, bytes: &[u8]) -> Result<(), BoxError>;
}

impl<T: Transducer + ?Sized> Transducer for Box<T> {
    fn await_passage(&mut self) -> Result<u64, BoxError> {
        (**self).await_passage()
    }
    fn apply_kick(&mut self) -> Result<(), BoxError> {
        (**self).apply_kick()
    }
}

impl<T: TemperatureSensor + ?Sized> TemperatureSensor for Box<T> {
    fn read(&mut self) -> Result<i32, BoxError> {
        (**self).read()
    }
}

impl<T: PersistentStore + ?Sized> PersistentStore for Box<T> {
    fn load(&mut self) -> Result<Option<Vec<u8>>, BoxError> {
        (**self).load()
    }
    fn save(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        (**self).save(bytes)
    }
}

use escapement_traits::{BoxError, TemperatureSensor};
use rppal::i2c::I2c;
use tracing::trace;

use crate::error::{HwError, Result};

/// Default bus address of the TMP102.
pub const TMP102_ADDRESS: u16 = 0x48;

/// TMP102 on the Raspberry Pi I2C bus.
pub struct Tmp102 {
    i2c: I2c,
}

impl Tmp102 {
    pub fn new(address: u16) -> Result<Self> {
        let mut i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self { i2c })
    }
}

impl TemperatureSensor for Tmp102 {
    fn read(&mut self) -> std::result::Result<i32, BoxError> {
        let mut buf = [0u8; 2];
        let n = self
            .i2c
            .read(&mut buf)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        if n != 2 {
            return Err(Box::new(HwError::SensorUnavailable));
        }
        // 12-bit reading left-aligned in 16 bits: the register is already °C × 256.
        let c256 = i32::from(i16::from_be_bytes(buf));
        trace!(c256, "tmp102 sample");
        Ok(c256)
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("passage wait timeout")]
    Timeout,
    #[error("temperature sensor unavailable")]
    SensorUnavailable,
    #[error("store error: {0}")]
    Store(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;

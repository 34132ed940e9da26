use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EscapementError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for passage")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("store error: {0}")]
    Store(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transducer")]
    MissingTransducer,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

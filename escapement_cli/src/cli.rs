//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use escapement_core::RunMode;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "escapement", version, about = "Escapement timekeeping CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Calibration record file (overrides [store].path)
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Emit JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// How the controller is started.
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Number of passages to process (runs until Ctrl-C when omitted)
    #[arg(long, value_name = "N")]
    pub beats: Option<u64>,

    /// Enter this mode instead of the one chosen from the stored record
    #[arg(long, value_name = "MODE", conflicts_with = "cold")]
    pub mode: Option<RunMode>,

    /// Discard the stored record and calibrate from scratch
    #[arg(long, action = ArgAction::SetTrue)]
    pub cold: bool,
}

impl StartArgs {
    pub fn initial_mode(&self) -> Option<RunMode> {
        if self.cold {
            Some(RunMode::ColdStart)
        } else {
            self.mode
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the controller with a simulated bendulum and thermometer
    Simulate {
        #[command(flatten)]
        start: StartArgs,

        /// Ramp the simulated temperature linearly to this value (°C)
        #[arg(long, value_name = "CELSIUS", allow_negative_numbers = true, requires = "beats")]
        temp_end: Option<f32>,

        /// Pace beats in real time instead of on a virtual clock
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Drive the controller with the coil and TMP102 on this machine
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    Run {
        #[command(flatten)]
        start: StartArgs,
    },
    /// Print the stored calibration record
    Show,
    /// Write the stored bucket table to a CSV file
    Export {
        #[arg(value_name = "CSV")]
        path: PathBuf,
    },
    /// Replace the stored bucket table with the contents of a CSV file
    Import {
        #[arg(value_name = "CSV")]
        path: PathBuf,
    },
    /// Clear the stored calibration so the next start calibrates again
    Reset {
        /// Keep the reference clock bias
        #[arg(long, action = ArgAction::SetTrue)]
        keep_bias: bool,
    },
    /// Set the reference clock bias, in tenths of a second per day
    Bias {
        #[arg(value_name = "TENTHS", allow_negative_numbers = true)]
        value: i32,

        /// Add to the stored bias instead of replacing it
        #[arg(long, action = ArgAction::SetTrue)]
        relative: bool,
    },
}

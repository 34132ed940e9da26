//! Tracing subscriber setup: console layer plus an optional file sink.

use std::path::Path;

use escapement_config::Logging;
use eyre::WrapErr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

fn rotation(name: Option<&str>) -> Rotation {
    match name {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber.
///
/// Console output goes to stderr so stdout stays machine readable. `RUST_LOG`
/// overrides `console_level`. When `[logging].file` is set, JSON lines are
/// written there through a non-blocking appender at `[logging].level`.
pub fn init(console_level: &str, json: bool, logging: &Logging) -> eyre::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("creating log directory {}", dir.display()))?;
            let appender =
                RollingFileAppender::new(rotation(logging.rotation.as_deref()), dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let level = logging.level.as_deref().unwrap_or("info");
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(EnvFilter::new(level))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_rotation_never_rotates() {
        assert_eq!(rotation(Some("daily")), Rotation::DAILY);
        assert_eq!(rotation(Some("hourly")), Rotation::HOURLY);
        assert_eq!(rotation(Some("weekly")), Rotation::NEVER);
        assert_eq!(rotation(None), Rotation::NEVER);
    }
}

mod cli;
mod error_fmt;
mod logging;
mod record;
#[cfg(all(feature = "hardware", target_os = "linux"))]
mod run;
mod session;
mod simulate;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use escapement_config::Config;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::record::RecordFile;

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    // Parse the typed config right here; validation follows.
    let cfg: Config = toml::from_str(&text)
        .wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    logging::init(&cli.log_level, cli.json, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let store = session::store_path(&cfg, cli.store.as_ref());
    match cli.cmd {
        Commands::Simulate {
            start,
            temp_end,
            realtime,
        } => simulate::run_simulation(
            &cfg,
            &simulate::SimulateOpts {
                start: &start,
                temp_end,
                realtime,
                store,
                json: cli.json,
            },
            &shutdown,
        ),
        #[cfg(all(feature = "hardware", target_os = "linux"))]
        Commands::Run { start } => run::run_hardware(&cfg, &start, store, cli.json, &shutdown),
        Commands::Show => record::show(&mut RecordFile::open(&cfg, store)?, cli.json),
        Commands::Export { path } => record::export(&mut RecordFile::open(&cfg, store)?, &path),
        Commands::Import { path } => record::import(&mut RecordFile::open(&cfg, store)?, &path),
        Commands::Reset { keep_bias } => {
            record::reset(&mut RecordFile::open(&cfg, store)?, keep_bias)
        }
        Commands::Bias { value, relative } => {
            record::bias(&mut RecordFile::open(&cfg, store)?, value, relative)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        let _ = color_eyre::install();
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
            tracing::debug!(error = ?err, "command failed");
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

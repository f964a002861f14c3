//! samplerate-sync: keeps the default output device running at the sample rate of whatever
//! the music player is playing.
//!
//! ## Flow
//! 1. **Watch**: a ticker and a default-device watcher raise sync triggers.
//! 2. **Scrape**: the sync worker reads the player log and takes the newest reported rate.
//! 3. **Match**: the rate is mapped onto the nearest rate the device supports.
//! 4. **Apply**: the device is switched only when that rate differs from its current one.
//!
//! ## Modes
//! - `run` (default): sync until Ctrl-C, logging every rate change.
//! - `once`: run one cycle and print the status as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use samplerate_sync::cli::{Args, Command};
use samplerate_sync::config::{FileConfig, SyncConfig, interval_from_ms};
use samplerate_sync::device::{CpalProvider, describe_default_device};
use samplerate_sync::runtime::{SyncService, run_once, watch_display};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,samplerate_sync=info")
        }))
        .init();

    let config = load_config(&args)?;
    let provider = Arc::new(CpalProvider::new());

    if args.list_devices {
        println!("{}", describe_default_device(provider.as_ref())?);
        return Ok(());
    }

    match args.cmd.clone().unwrap_or(Command::Run { print_status: false }) {
        Command::Once => {
            let (outcome, status) = run_once(provider, config.log_source()?);
            tracing::info!(?outcome, "sync cycle finished");
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Run { print_status } => run(provider, &config, print_status)?,
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<SyncConfig> {
    let file = match args.config.as_ref() {
        Some(path) => FileConfig::load(path)?,
        None => {
            let auto_path = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
            match auto_path {
                Some(path) if path.exists() => FileConfig::load(&path)?,
                _ => FileConfig::default(),
            }
        }
    };

    let mut config = SyncConfig::from_file(&file)?;
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval = interval_from_ms("--poll-interval-ms", ms)?;
    }
    if let Some(ms) = args.device_poll_interval_ms {
        config.device_poll_interval = interval_from_ms("--device-poll-interval-ms", ms)?;
    }
    Ok(config)
}

fn run(provider: Arc<CpalProvider>, config: &SyncConfig, print_status: bool) -> Result<()> {
    let log_source = config.log_source()?;
    let service = SyncService::spawn(provider, log_source, config)?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("install Ctrl-C handler")?;

    let display = service.display();
    watch_display(&display, config.display_interval, &stop_rx, |text| {
        tracing::info!(rate = %text, "output sample rate");
        if print_status {
            println!("{text}");
        }
    });

    tracing::info!("shutting down");
    service.shutdown();
    Ok(())
}

//! steno-monitor: prints the strokes written on an attached steno machine.
//!
//! # Usage
//!
//! ```text
//! steno-monitor [OPTIONS]
//!
//! Options:
//!   --config <PATH>      Config file [default: platform config directory]
//!   --log-level <LEVEL>  Log level when RUST_LOG is unset [env: STENO_LOG_LEVEL]
//!   --no-flush           Keep strokes buffered before startup
//! ```
//!
//! # What happens at startup
//!
//! 1. The config file is loaded (defaults if it does not exist).
//! 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over
//!    `--log-level`, which wins over the config file.
//! 3. The machine is opened.  If none is attached the process exits with
//!    status 1.
//! 4. Unless disabled, strokes buffered before startup are flushed so only
//!    new writing is printed.
//! 5. One line per stroke is printed until Ctrl+C, then the machine is
//!    closed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use steno_device::infrastructure::storage::config::{load_config, load_config_from};
use steno_device::StenoDevice;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Steno machine stroke monitor.
#[derive(Debug, Parser)]
#[command(
    name = "steno-monitor",
    about = "Reads strokes from a USB steno machine and prints them",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "STENO_LOG_LEVEL")]
    log_level: Option<String>,

    /// Do not discard strokes the machine buffered before startup.
    #[arg(long)]
    no_flush: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config().context("failed to load config")?,
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let device = match StenoDevice::open(config.device.to_device_config())
        .context("failed to open the steno machine")?
    {
        Some(device) => device,
        None => {
            eprintln!("no steno machine found");
            return Ok(ExitCode::FAILURE);
        }
    };

    if config.general.flush_on_start && !cli.no_flush {
        info!("flushing strokes buffered before startup");
        device.flush().await.context("flush failed")?;
    }

    let events = device.events();
    events.subscribe_stroke(|stroke| println!("{stroke}"));
    events.subscribe_transport_error(|e| warn!("transport error: {e}"));
    events.subscribe_incorrect_byte_count(|n| warn!("short packet: {n} bytes"));
    events.subscribe_incorrect_sequence_number(|m| {
        warn!(
            "sequence mismatch: expected {}, received {}",
            m.expected, m.received
        )
    });

    device.start().context("failed to start reading")?;
    info!("reading strokes; press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C signal: {e}");
    }

    device.close().await;
    Ok(ExitCode::SUCCESS)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! eBox Modbus - wallbox poller and setpoint writer
//!
//! `ebox query [REPETITIONS] [INTERVAL]` polls the register map and pushes it
//! to InfluxDB; `ebox write P1 P2 P3` sets the per-phase current limits.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ebox_modbus::{config, runner};

#[derive(Parser)]
#[command(version, about)]
enum Command {
    /// Read every register once per repetition and store the result
    Query {
        /// Number of poll cycles
        #[arg(default_value_t = 1)]
        repetitions: u32,
        /// Seconds between the start of two cycles
        #[arg(default_value_t = 0)]
        interval: u64,
    },
    /// Write the maximum current for each phase, in amps
    Write {
        #[arg(value_name = "MAX_CURRENT_PHASE1")]
        phase1: f32,
        #[arg(value_name = "MAX_CURRENT_PHASE2")]
        phase2: f32,
        #[arg(value_name = "MAX_CURRENT_PHASE3")]
        phase3: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let command = Command::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting ebox v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config()?;
    info!(
        "Configuration loaded: wallbox {}:{}",
        config.device.host, config.device.port
    );

    match command {
        Command::Query {
            repetitions,
            interval,
        } => runner::poll_repeatedly(&config, repetitions, Duration::from_secs(interval)).await,
        Command::Write {
            phase1,
            phase2,
            phase3,
        } => runner::write_setpoint(&config, [phase1, phase2, phase3])
            .await
            .map(|_| ()),
    }
}

//! # Rover Teleop
//!
//! Teleoperation controller for the rover.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (first argument, else `config/default.toml`)
//!    - Launch the camera viewer and open every input and output device
//!
//! 2. **Main Loop**
//!    - Poll the gamepad every 50 ms, or the keyboard every 100 ms
//!    - Send one motor frame per tick
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Close the serial link and stop the viewer
//!    - Log the frame counters

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use rover_teleop::config::Config;
use rover_teleop::control::{ControlLoop, Devices};
use rover_teleop::mode::ModeState;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Loads the configuration, tolerating a missing default file.
///
/// An explicitly named file must exist and parse.
fn load_config(explicit: Option<&str>) -> Result<Config> {
    match explicit {
        Some(path) => {
            Config::load(path).with_context(|| format!("Failed to load config from {}", path))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH)),
        None => {
            warn!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
            Ok(Config::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging goes through a background writer so a slow terminal never
    // stalls the control loop
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(writer)
        .init();

    info!("Rover Teleop v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref())?;

    let mode = Arc::new(ModeState::new());
    let devices = Devices::open(&config).await;
    let control = ControlLoop::new(Arc::clone(&mode), devices, &config);

    info!("Press Ctrl+C to exit");

    let report = control
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down...");
        })
        .await;

    info!(
        "Total: {} ticks, {} frames sent, {} write failures",
        report.ticks, report.frames_sent, report.write_failures
    );

    Ok(())
}

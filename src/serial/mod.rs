//! # Serial Communication Module
//!
//! Handles the serial link to the motor controller.
//!
//! This module handles:
//! - Opening the serial port (9600 baud, 8N1 by default)
//! - Waiting for the controller to finish its reset after the port opens
//! - Fire-and-forget transmission of drive frames
//! - Running without a link when no controller is attached

pub mod port_trait;

use crate::command::DriveCommand;
use crate::config::SerialConfig;
use crate::error::{Result, TeleopError};
use port_trait::{SerialPortIO, SerialStreamPort};
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Motor controller link, present or absent.
///
/// An absent link accepts frames and drops them, so the control loop runs
/// identically with or without hardware attached.
pub struct MotorLink {
    port: Option<Box<dyn SerialPortIO>>,
    device_path: String,
}

impl std::fmt::Debug for MotorLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorLink")
            .field("device_path", &self.device_path)
            .field("present", &self.is_present())
            .finish_non_exhaustive()
    }
}

impl Default for MotorLink {
    fn default() -> Self {
        Self::absent()
    }
}

impl MotorLink {
    /// Open the configured port, falling back to an absent link.
    ///
    /// Never fails; an unavailable port is logged and replaced by
    /// [`MotorLink::absent`].
    pub async fn open(config: &SerialConfig) -> Self {
        match Self::open_port(&config.port, config.baud_rate) {
            Ok(port) => {
                info!("Opened motor controller at {} ({} baud)", config.port, config.baud_rate);
                if config.settle_ms > 0 {
                    debug!("Waiting {} ms for motor controller reset", config.settle_ms);
                    tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;
                }
                Self::with_port(Box::new(SerialStreamPort::new(port)), &config.port)
            }
            Err(e) => {
                warn!("Serial not available: {}", e);
                Self::absent()
            }
        }
    }

    /// Link that drops every frame.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            port: None,
            device_path: String::new(),
        }
    }

    /// Wrap an already-open port.
    #[must_use]
    pub fn with_port(port: Box<dyn SerialPortIO>, device_path: &str) -> Self {
        Self {
            port: Some(port),
            device_path: device_path.to_string(),
        }
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        if path.is_empty() {
            return Err(TeleopError::SerialPortNotFound("<none configured>".to_string()));
        }

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| TeleopError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.port.is_some()
    }

    /// Path of the open device, empty when absent.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Send one drive frame.
    ///
    /// Returns `Ok(false)` when the link is absent and the frame was dropped.
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if the write or flush fails. Nothing is queued
    /// or retried.
    pub async fn send_frame(&mut self, command: &DriveCommand) -> Result<bool> {
        let Some(port) = self.port.as_mut() else {
            return Ok(false);
        };

        let frame = command.encode();

        port.write_all(frame.as_bytes())
            .await
            .map_err(|e| TeleopError::Serial(format!("Failed to write frame: {}", e)))?;

        port.flush()
            .await
            .map_err(|e| TeleopError::Serial(format!("Failed to flush serial port: {}", e)))?;

        Ok(true)
    }

    /// Release the port. Later sends are dropped.
    pub async fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.shutdown().await {
                warn!("Error closing {}: {}", self.device_path, e);
            }
            info!("Closed motor controller link {}", self.device_path);
        }
    }
}

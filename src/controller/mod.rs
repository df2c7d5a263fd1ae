//! # Controller Module
//!
//! Operator input devices.
//!
//! This module handles:
//! - USB gamepad detection and polling via evdev
//! - Keyboard fallback polling when no gamepad is present
//! - Translating device readings into [`GamepadState`] and [`ModeCommand`]s

pub mod gamepad;
pub mod keyboard;
pub mod state;

use evdev::Device;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TeleopError};
use crate::mode::ModeCommand;
pub use state::GamepadState;

/// A pollable gamepad.
pub trait Gamepad: Send {
    /// Sample the current stick and button levels without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Controller` error if the device has gone away.
    fn poll(&mut self) -> Result<GamepadState>;

    /// Human-readable device name.
    fn name(&self) -> &str;
}

/// A pollable keyboard producing level-triggered mode commands.
pub trait Keyboard: Send {
    /// Commands for every mapped key currently held, in a fixed order.
    ///
    /// # Errors
    ///
    /// Returns `Controller` error if the device has gone away.
    fn poll(&mut self) -> Result<Vec<ModeCommand>>;
}

/// Open an explicit evdev path, or scan `/dev/input/event*` for the first
/// device accepted by `matches`.
///
/// Returns the device and the path it was opened from.
pub(crate) fn open_event_device<F>(explicit_path: &str, matches: F) -> Result<(Device, String)>
where
    F: Fn(&Device) -> bool,
{
    if !explicit_path.is_empty() {
        let device = Device::open(explicit_path)
            .map_err(|e| TeleopError::Controller(format!("Failed to open {}: {}", explicit_path, e)))?;
        return Ok((device, explicit_path.to_string()));
    }

    let input_dir = Path::new("/dev/input");

    if !input_dir.exists() {
        return Err(TeleopError::Controller("/dev/input directory not found".to_string()));
    }

    let mut entries: Vec<_> = std::fs::read_dir(input_dir)
        .map_err(|e| TeleopError::Controller(format!("Failed to read /dev/input: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TeleopError::Controller(format!("Failed to read directory entry: {}", e)))?;

    // Deterministic choice when several devices match
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();

        let is_event_node = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with("event"))
            .unwrap_or(false);
        if !is_event_node {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                debug!(
                    "Found input device: {} ({})",
                    path.display(),
                    device.name().unwrap_or("unnamed")
                );
                if matches(&device) {
                    return Ok((device, path.to_string_lossy().to_string()));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Err(TeleopError::ControllerNotFound)
}

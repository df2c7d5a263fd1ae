//! # USB Gamepad
//!
//! Detects and polls a USB gamepad through the Linux evdev interface.
//!
//! ## Controller Detection
//!
//! Any input device exposing the south/east face buttons and the X/Y
//! absolute axes is treated as a gamepad, unless an explicit device path is
//! configured.
//!
//! ## Polling
//!
//! Instead of draining the event queue, each poll queries the kernel for
//! the current key and axis state. This never blocks and always reflects
//! the latest levels, which is what the edge detectors need.

use evdev::{AbsoluteAxisType, Device, Key};
use tracing::info;

use super::state::{AxisRange, GamepadState};
use super::{open_event_device, Gamepad};
use crate::error::{Result, TeleopError};

/// Keys sampled on every poll.
const TRACKED_KEYS: [Key; 6] = [
    Key::BTN_SOUTH,
    Key::BTN_EAST,
    Key::BTN_WEST,
    Key::BTN_NORTH,
    Key::BTN_TL,
    Key::BTN_TR,
];

/// Axes sampled on every poll.
const TRACKED_AXES: [AbsoluteAxisType; 2] = [AbsoluteAxisType::ABS_X, AbsoluteAxisType::ABS_Y];

/// True when `device` looks like a gamepad.
fn is_gamepad(device: &Device) -> bool {
    let has_buttons = device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_SOUTH) && keys.contains(Key::BTN_EAST))
        .unwrap_or(false);
    let has_stick = device
        .supported_absolute_axes()
        .map(|axes| axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y))
        .unwrap_or(false);
    has_buttons && has_stick
}

/// Gamepad handle backed by an evdev device.
pub struct EvdevGamepad {
    device: Device,
    device_path: String,
    name: String,
}

impl std::fmt::Debug for EvdevGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevGamepad")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl EvdevGamepad {
    /// Open `device_path`, or the first detected gamepad when it is empty.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no gamepad found on the system
    /// - `Controller`: the configured device could not be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_teleop::controller::gamepad::EvdevGamepad;
    ///
    /// let gamepad = EvdevGamepad::open("")?;
    /// println!("Connected to gamepad at: {}", gamepad.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_path: &str) -> Result<Self> {
        let (device, device_path) = open_event_device(device_path, is_gamepad)?;
        let name = device.name().unwrap_or("Unknown gamepad").to_string();
        info!("Using USB gamepad: {} ({})", name, device_path);

        Ok(Self {
            device,
            device_path,
            name,
        })
    }

    /// The `/dev/input/eventX` path this gamepad was opened from.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl Gamepad for EvdevGamepad {
    fn poll(&mut self) -> Result<GamepadState> {
        let keys = self
            .device
            .get_key_state()
            .map_err(|e| TeleopError::Controller(format!("Failed to read buttons: {}", e)))?;
        let axes = self
            .device
            .get_abs_state()
            .map_err(|e| TeleopError::Controller(format!("Failed to read axes: {}", e)))?;

        let mut state = GamepadState::new();

        for key in TRACKED_KEYS {
            state.apply_key(key, keys.contains(key));
        }

        for axis in TRACKED_AXES {
            let info = &axes[axis.0 as usize];
            let range = AxisRange {
                min: info.minimum,
                max: info.maximum,
            };
            state.apply_axis(axis, info.value, range);
        }

        Ok(state)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! # Keyboard Fallback
//!
//! Direct mode keys used when no gamepad is attached.
//!
//! | Key | Command |
//! |-----|---------|
//! | E | Enable drive |
//! | D | Disable drive |
//! | 1 / 2 / 3 | Brush level 1 / 2 / 3 |
//! | Q / W / R | Wheel preset 1 / 2 / 3 |
//!
//! Keys are level-triggered: a held key reissues its command every tick,
//! which is harmless because every mode command is idempotent.

use evdev::{AttributeSetRef, Device, Key};
use tracing::info;

use super::{open_event_device, Keyboard};
use crate::error::{Result, TeleopError};
use crate::mode::{ModeCommand, WheelPreset};

/// Key bindings, in the order they are applied each tick.
pub const KEY_BINDINGS: [(Key, ModeCommand); 8] = [
    (Key::KEY_E, ModeCommand::Enable),
    (Key::KEY_D, ModeCommand::Disable),
    (Key::KEY_1, ModeCommand::Brush(1)),
    (Key::KEY_2, ModeCommand::Brush(2)),
    (Key::KEY_3, ModeCommand::Brush(3)),
    (Key::KEY_Q, ModeCommand::Wheel(WheelPreset::Slow)),
    (Key::KEY_W, ModeCommand::Wheel(WheelPreset::Medium)),
    (Key::KEY_R, ModeCommand::Wheel(WheelPreset::Fast)),
];

/// Commands for every bound key contained in `pressed`.
#[must_use]
pub fn commands_for(pressed: &AttributeSetRef<Key>) -> Vec<ModeCommand> {
    KEY_BINDINGS
        .iter()
        .filter(|(key, _)| pressed.contains(*key))
        .map(|&(_, command)| command)
        .collect()
}

fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| KEY_BINDINGS.iter().all(|(key, _)| keys.contains(*key)))
        .unwrap_or(false)
}

/// Keyboard handle backed by an evdev device.
pub struct EvdevKeyboard {
    device: Device,
}

impl EvdevKeyboard {
    /// Open `device_path`, or the first keyboard carrying all bound keys.
    ///
    /// # Errors
    ///
    /// Returns `ControllerNotFound` or `Controller` if no keyboard can be opened.
    pub fn open(device_path: &str) -> Result<Self> {
        let (device, path) = open_event_device(device_path, is_keyboard)?;
        info!(
            "Using keyboard fallback: {} ({})",
            device.name().unwrap_or("Unknown keyboard"),
            path
        );
        Ok(Self { device })
    }
}

impl Keyboard for EvdevKeyboard {
    fn poll(&mut self) -> Result<Vec<ModeCommand>> {
        let pressed = self
            .device
            .get_key_state()
            .map_err(|e| TeleopError::Controller(format!("Failed to read keyboard: {}", e)))?;
        Ok(commands_for(&pressed))
    }
}

//! # Gamepad State
//!
//! Snapshot of the gamepad inputs the rover uses, built from evdev key and
//! absolute-axis readings.
//!
//! ## Axis Codes (EV_ABS)
//!
//! | Axis | evdev Code | Use |
//! |------|------------|-----|
//! | Left Stick X | ABS_X | Turn (pivot) |
//! | Left Stick Y | ABS_Y | Forward, inverted (stick up = forward) |
//!
//! ## Button Codes (EV_KEY)
//!
//! | Button | evdev Code | Use |
//! |--------|------------|-----|
//! | A | BTN_SOUTH | Brush level up |
//! | B | BTN_EAST | Enable toggle |
//! | X | BTN_WEST | Wheel preset 2 |
//! | Y | BTN_NORTH | Brush level down |
//! | LB | BTN_TL | Wheel preset 1 |
//! | RB | BTN_TR | Wheel preset 3 |

use evdev::{AbsoluteAxisType, Key};

use crate::fusion::IntentVector;

/// Reported range of one absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl Default for AxisRange {
    /// Signed 16-bit range used by most USB gamepads.
    fn default() -> Self {
        Self {
            min: i16::MIN as i32,
            max: i16::MAX as i32,
        }
    }
}

impl AxisRange {
    /// Maps a raw reading onto `-1.0..=1.0`.
    ///
    /// ```
    /// use rover_teleop::controller::state::AxisRange;
    ///
    /// let range = AxisRange { min: 0, max: 255 };
    /// assert_eq!(range.normalize(0), -1.0);
    /// assert_eq!(range.normalize(255), 1.0);
    /// ```
    #[must_use]
    pub fn normalize(&self, value: i32) -> f64 {
        let span = (self.max as f64) - (self.min as f64);
        if span <= 0.0 {
            return 0.0;
        }
        let scaled = 2.0 * ((value as f64) - (self.min as f64)) / span - 1.0;
        scaled.clamp(-1.0, 1.0)
    }
}

/// Gamepad inputs sampled on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadState {
    /// Turn axis, -1.0 = full left, 1.0 = full right.
    pub axis_x: f64,
    /// Stick Y as reported, -1.0 = full up, 1.0 = full down.
    pub axis_y: f64,

    pub btn_a: bool,
    pub btn_b: bool,
    pub btn_x: bool,
    pub btn_y: bool,
    pub btn_lb: bool,
    pub btn_rb: bool,
}

impl GamepadState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a button level. Unused keys are ignored.
    pub fn apply_key(&mut self, key: Key, pressed: bool) {
        match key {
            Key::BTN_SOUTH => self.btn_a = pressed,
            Key::BTN_EAST => self.btn_b = pressed,
            Key::BTN_WEST => self.btn_x = pressed,
            Key::BTN_NORTH => self.btn_y = pressed,
            Key::BTN_TL => self.btn_lb = pressed,
            Key::BTN_TR => self.btn_rb = pressed,
            _ => {}
        }
    }

    /// Records an axis reading. Unused axes are ignored.
    pub fn apply_axis(&mut self, axis: AbsoluteAxisType, value: i32, range: AxisRange) {
        match axis {
            AbsoluteAxisType::ABS_X => self.axis_x = range.normalize(value),
            AbsoluteAxisType::ABS_Y => self.axis_y = range.normalize(value),
            _ => {}
        }
    }

    /// Drive intent from the stick, with forward positive.
    #[must_use]
    pub fn intent(&self) -> IntentVector {
        IntentVector::new(self.axis_x, -self.axis_y)
    }
}

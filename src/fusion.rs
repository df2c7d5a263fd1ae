//! # Input Fusion
//!
//! Selects one drive intent from the gamepad stick and the analog joystick.
//!
//! The sources are never blended. The gamepad wins whenever either of its
//! axes is outside the deadzone; the analog joystick is consulted only when
//! the gamepad is idle. This keeps a low-resolution fallback stick from
//! fighting a real controller.
//!
//! ```
//! use rover_teleop::fusion::{fuse, IntentVector};
//!
//! let gamepad = IntentVector::new(0.05, 0.0);
//! let joystick = IntentVector::new(0.0, 0.8);
//!
//! assert_eq!(fuse(gamepad, joystick, 0.2), joystick);
//! ```

/// Deadzone applied to every analog axis.
pub const DEFAULT_DEADZONE: f64 = 0.2;

/// Operator drive intent: `x` is the turn axis, `y` the forward axis, both in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntentVector {
    pub x: f64,
    pub y: f64,
}

impl IntentVector {
    /// No motion.
    pub const ZERO: IntentVector = IntentVector { x: 0.0, y: 0.0 };

    /// Creates an intent vector, clamping both axes to `-1.0..=1.0`.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }

    /// True when either axis magnitude exceeds `deadzone`.
    #[must_use]
    pub fn is_active(&self, deadzone: f64) -> bool {
        self.x.abs() > deadzone || self.y.abs() > deadzone
    }
}

/// Picks the gamepad pair, else the joystick pair, else [`IntentVector::ZERO`].
#[must_use]
pub fn fuse(gamepad: IntentVector, joystick: IntentVector, deadzone: f64) -> IntentVector {
    if gamepad.is_active(deadzone) {
        gamepad
    } else if joystick.is_active(deadzone) {
        joystick
    } else {
        IntentVector::ZERO
    }
}

//! # Drive Command Encoder
//!
//! Turns the operating mode and drive intent into the text frame understood
//! by the motor controller.
//!
//! ## Frame Format
//!
//! ```text
//! D <m1> <m2> <m3> <m4> <aux>\n
//! ```
//!
//! `m1`..`m4` are signed wheel commands, `aux` is the brush level (0-3).
//! Wheels 1 and 3 sit on one side of the rover, 2 and 4 on the other.
//!
//! ## Drive Modes
//!
//! | Intent | Mode | Wheels |
//! |--------|------|--------|
//! | `\|y\| > deadzone` | Straight | all = `y * max_speed` |
//! | `\|x\| > deadzone` | Pivot | `m1 = m3 = x * max_speed`, `m2 = m4 = -m1` |
//! | otherwise | Stop | all = 0 |
//!
//! Forward takes priority over turning; the two are never mixed. Scaled
//! values are truncated toward zero, which is what the motor controller
//! firmware has always been fed.

use std::fmt;

use crate::fusion::IntentVector;

/// Frame type tag for drive commands.
pub const FRAME_TAG: char = 'D';

/// One tick's worth of motor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveCommand {
    pub motors: [i32; 4],
    pub aux: u8,
}

impl DriveCommand {
    /// All wheels stopped, brush off.
    pub const FAIL_SAFE: DriveCommand = DriveCommand { motors: [0; 4], aux: 0 };

    /// Computes the wheel commands for one tick.
    ///
    /// When `enabled` is false every wheel is 0 whatever the intent, but
    /// the brush level is still reported.
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_teleop::command::DriveCommand;
    /// use rover_teleop::fusion::IntentVector;
    ///
    /// let cmd = DriveCommand::compute(true, IntentVector::new(0.0, 0.9), 30, 1, 0.2);
    /// assert_eq!(cmd.motors, [27, 27, 27, 27]);
    /// assert_eq!(cmd.encode(), "D 27 27 27 27 1\n");
    /// ```
    #[must_use]
    pub fn compute(enabled: bool, intent: IntentVector, max_speed: i32, aux: u8, deadzone: f64) -> Self {
        let motors = if !enabled {
            [0; 4]
        } else if intent.y.abs() > deadzone {
            let speed = scale(intent.y, max_speed);
            [speed; 4]
        } else if intent.x.abs() > deadzone {
            let turn = scale(intent.x, max_speed);
            [turn, -turn, turn, -turn]
        } else {
            [0; 4]
        };

        Self { motors, aux }
    }

    /// Serializes the command as a newline-terminated ASCII frame.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for DriveCommand {
    /// Frame without the trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [m1, m2, m3, m4] = self.motors;
        write!(f, "{} {} {} {} {} {}", FRAME_TAG, m1, m2, m3, m4, self.aux)
    }
}

/// Scales a normalized axis to a motor command, truncating toward zero.
fn scale(axis: f64, max_speed: i32) -> i32 {
    (axis * max_speed as f64).trunc() as i32
}

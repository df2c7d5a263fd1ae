//! # Mode State
//!
//! The rover's persistent operating mode, shared between the control loop
//! and the remote control surface.
//!
//! Each facet (drive enable, brush level, wheel preset) lives in its own
//! atomic, so readers and writers on different tasks never need a lock.
//! Every mutation republishes a [`StatusSnapshot`] on a
//! [`tokio::sync::watch`] channel; subscribers see the latest status and can
//! await changes.
//!
//! ```
//! use rover_teleop::mode::ModeState;
//!
//! let mode = ModeState::new();
//! mode.enable();
//! mode.set_aux_level(7);
//! assert!(mode.is_enabled());
//! assert_eq!(mode.aux_level(), 3);
//! assert_eq!(mode.max_speed(), 30);
//! ```

use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::watch;
use tracing::info;

use crate::error::TeleopError;

/// Lowest brush level (brush off).
pub const AUX_LEVEL_MIN: u8 = 0;

/// Highest brush level.
pub const AUX_LEVEL_MAX: u8 = 3;

/// Clamps any requested brush level into `AUX_LEVEL_MIN..=AUX_LEVEL_MAX`.
///
/// This is the only place the brush range is enforced.
#[must_use]
pub fn clamp_aux_level(level: i32) -> u8 {
    level.clamp(AUX_LEVEL_MIN as i32, AUX_LEVEL_MAX as i32) as u8
}

/// Wheel speed preset, selecting the maximum motor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WheelPreset {
    #[default]
    Slow = 1,
    Medium = 2,
    Fast = 3,
}

impl WheelPreset {
    /// Maps a preset number to a preset; anything outside `1..=3` is `None`.
    #[must_use]
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(WheelPreset::Slow),
            2 => Some(WheelPreset::Medium),
            3 => Some(WheelPreset::Fast),
            _ => None,
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Largest motor command magnitude allowed under this preset.
    #[must_use]
    pub fn max_speed(self) -> i32 {
        match self {
            WheelPreset::Slow => 30,
            WheelPreset::Medium => 45,
            WheelPreset::Fast => 60,
        }
    }
}

/// Published status, serialized as `{"enabled": .., "brush": .., "wheel": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub brush: u8,
    pub wheel: u8,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            enabled: false,
            brush: AUX_LEVEL_MIN,
            wheel: WheelPreset::default().level(),
        }
    }
}

/// A discrete mode change, issued by the keyboard fallback or a remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    Enable,
    Disable,
    Brush(u8),
    Wheel(WheelPreset),
}

impl FromStr for ModeCommand {
    type Err = TeleopError;

    /// Parses the remote tokens `enable`, `disable`, `brush1..3`, `wheel1..3`.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "enable" => Ok(ModeCommand::Enable),
            "disable" => Ok(ModeCommand::Disable),
            "brush1" => Ok(ModeCommand::Brush(1)),
            "brush2" => Ok(ModeCommand::Brush(2)),
            "brush3" => Ok(ModeCommand::Brush(3)),
            "wheel1" => Ok(ModeCommand::Wheel(WheelPreset::Slow)),
            "wheel2" => Ok(ModeCommand::Wheel(WheelPreset::Medium)),
            "wheel3" => Ok(ModeCommand::Wheel(WheelPreset::Fast)),
            other => Err(TeleopError::UnknownCommand(other.to_string())),
        }
    }
}

/// Shared operating mode. Wrap in an `Arc` to share between tasks.
#[derive(Debug)]
pub struct ModeState {
    enabled: AtomicBool,
    aux_level: AtomicU8,
    wheel_preset: AtomicU8,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeState {
    /// Disabled, brush off, slow wheels.
    #[must_use]
    pub fn new() -> Self {
        let initial = StatusSnapshot::default();
        let (status_tx, _) = watch::channel(initial);
        Self {
            enabled: AtomicBool::new(initial.enabled),
            aux_level: AtomicU8::new(initial.brush),
            wheel_preset: AtomicU8::new(initial.wheel),
            status_tx,
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        self.publish();
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.publish();
    }

    /// Flips drive enable and returns the new value.
    pub fn toggle_enabled(&self) -> bool {
        let enabled = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        self.publish();
        enabled
    }

    /// Stores `level` clamped into the brush range and returns the stored level.
    pub fn set_aux_level(&self, level: i32) -> u8 {
        let level = clamp_aux_level(level);
        self.aux_level.store(level, Ordering::SeqCst);
        self.publish();
        level
    }

    /// Moves the brush level by `delta`, saturating at the range ends.
    pub fn step_aux_level(&self, delta: i32) -> u8 {
        let step = |level: u8| Some(clamp_aux_level(level as i32 + delta));
        // The closure never returns None, so both arms carry the previous level
        let previous = match self.aux_level.fetch_update(Ordering::SeqCst, Ordering::SeqCst, step) {
            Ok(previous) | Err(previous) => previous,
        };
        self.publish();
        clamp_aux_level(previous as i32 + delta)
    }

    /// Selects wheel preset `level`. Values outside `1..=3` are ignored.
    ///
    /// Returns whether the preset was accepted.
    pub fn set_wheel_preset(&self, level: i32) -> bool {
        match WheelPreset::from_level(level) {
            Some(preset) => {
                self.wheel_preset.store(preset.level(), Ordering::SeqCst);
                self.publish();
                true
            }
            None => false,
        }
    }

    /// Applies one discrete mode command.
    pub fn apply(&self, command: ModeCommand) {
        match command {
            ModeCommand::Enable => self.enable(),
            ModeCommand::Disable => self.disable(),
            ModeCommand::Brush(level) => {
                self.set_aux_level(level as i32);
            }
            ModeCommand::Wheel(preset) => {
                self.set_wheel_preset(preset.level() as i32);
            }
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn aux_level(&self) -> u8 {
        self.aux_level.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn wheel_preset(&self) -> WheelPreset {
        WheelPreset::from_level(self.wheel_preset.load(Ordering::SeqCst) as i32).unwrap_or_default()
    }

    #[must_use]
    pub fn max_speed(&self) -> i32 {
        self.wheel_preset().max_speed()
    }

    /// Reads the current status directly from the atomics.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            enabled: self.is_enabled(),
            brush: self.aux_level(),
            wheel: self.wheel_preset().level(),
        }
    }

    /// Receiver that always holds the most recently published status.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    /// Republishes the status if it changed.
    ///
    /// The snapshot is taken while the channel is locked, so concurrent
    /// publishers are serialized and the last one always sees the latest
    /// atomics.
    fn publish(&self) {
        let mut snapshot = StatusSnapshot::default();
        let changed = self.status_tx.send_if_modified(|current| {
            snapshot = self.snapshot();
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });

        if changed {
            info!(
                enabled = snapshot.enabled,
                brush = snapshot.brush,
                wheel = snapshot.wheel,
                "Status updated"
            );
        }
    }
}

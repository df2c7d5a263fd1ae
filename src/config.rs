//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{Result, TeleopError};
use crate::fusion::DEFAULT_DEADZONE;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub adc: AdcConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

/// Serial link to the motor controller
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Wait after opening the port; the motor controller resets on connect.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Input device configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Gamepad evdev path, empty to auto-detect.
    #[serde(default)]
    pub device_path: String,

    /// Keyboard evdev path, empty to auto-detect.
    #[serde(default)]
    pub keyboard_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: f64,
}

/// MCP3008 analog joystick configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AdcConfig {
    #[serde(default = "default_adc_enabled")]
    pub enabled: bool,

    #[serde(default = "default_clock_hz")]
    pub clock_hz: u32,

    #[serde(default = "default_x_channel")]
    pub x_channel: u8,

    #[serde(default = "default_y_channel")]
    pub y_channel: u8,
}

/// Control loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_gamepad_period_ms")]
    pub gamepad_period_ms: u64,

    #[serde(default = "default_keyboard_period_ms")]
    pub keyboard_period_ms: u64,

    #[serde(default = "default_log_interval_frames")]
    pub log_interval_frames: u64,
}

/// Fullscreen camera viewer launched alongside the loop
#[derive(Debug, Deserialize, Clone)]
pub struct ViewerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_viewer_command")]
    pub command: Vec<String>,

    #[serde(default = "default_kill_existing")]
    pub kill_existing: bool,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_settle_ms() -> u64 { 2000 }

fn default_deadzone() -> f64 { DEFAULT_DEADZONE }

fn default_adc_enabled() -> bool { true }
fn default_clock_hz() -> u32 { 1_350_000 }
fn default_x_channel() -> u8 { 1 }
fn default_y_channel() -> u8 { 0 }

fn default_gamepad_period_ms() -> u64 { 50 }
fn default_keyboard_period_ms() -> u64 { 100 }
fn default_log_interval_frames() -> u64 { 200 }

fn default_viewer_command() -> Vec<String> {
    vec!["cheese".to_string(), "--fullscreen".to_string()]
}
fn default_kill_existing() -> bool { true }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            keyboard_path: String::new(),
            deadzone: default_deadzone(),
        }
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            enabled: default_adc_enabled(),
            clock_hz: default_clock_hz(),
            x_channel: default_x_channel(),
            y_channel: default_y_channel(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            gamepad_period_ms: default_gamepad_period_ms(),
            keyboard_period_ms: default_keyboard_period_ms(),
            log_interval_frames: default_log_interval_frames(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_viewer_command(),
            kill_existing: default_kill_existing(),
        }
    }
}

/// Supported motor controller baud rates
const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

fn invalid(msg: impl std::fmt::Display) -> TeleopError {
    TeleopError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_teleop::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200"));
        }

        if self.serial.settle_ms > 10000 {
            return Err(invalid("settle_ms must be between 0 and 10000"));
        }

        if !(0.0..=0.5).contains(&self.controller.deadzone) {
            return Err(invalid("deadzone must be between 0.0 and 0.5"));
        }

        if self.adc.clock_hz == 0 {
            return Err(invalid("adc clock_hz must be greater than 0"));
        }

        // MCP3008 has 8 single-ended channels
        for (name, channel) in [("x_channel", self.adc.x_channel), ("y_channel", self.adc.y_channel)] {
            if channel > 7 {
                return Err(invalid(format!("{} {} is out of bounds (must be 0-7)", name, channel)));
            }
        }

        if self.adc.x_channel == self.adc.y_channel {
            return Err(invalid("adc x_channel and y_channel must differ"));
        }

        for (name, value) in [
            ("gamepad_period_ms", self.timing.gamepad_period_ms),
            ("keyboard_period_ms", self.timing.keyboard_period_ms),
        ] {
            if value == 0 || value > 1000 {
                return Err(invalid(format!("{} must be between 1 and 1000", name)));
            }
        }

        if self.timing.log_interval_frames == 0 {
            return Err(invalid("log_interval_frames must be greater than 0"));
        }

        if self.viewer.enabled && self.viewer.command.is_empty() {
            return Err(invalid("viewer command cannot be empty when enabled"));
        }

        Ok(())
    }
}

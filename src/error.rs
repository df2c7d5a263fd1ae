//! # Error Types
//!
//! Custom error types for Rover Teleop using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Teleop
#[derive(Debug, Error)]
pub enum TeleopError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port open/write errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No motor controller found (tried: {0})")]
    SerialPortNotFound(String),

    /// Input device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad-like input device present
    #[error("No gamepad found")]
    ControllerNotFound,

    /// SPI/ADC errors
    #[error("ADC error: {0}")]
    Adc(String),

    /// Remote command token outside the accepted set
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Result type alias for Rover Teleop
pub type Result<T> = std::result::Result<T, TeleopError>;

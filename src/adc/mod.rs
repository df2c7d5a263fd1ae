//! # Analog Joystick Module
//!
//! Reads the fallback analog joystick wired to an MCP3008 ADC over SPI.
//!
//! The joystick is wired so that its X potentiometer runs the opposite way
//! to the gamepad's turn axis, so X is inverted during normalization while
//! Y is not. When the SPI peripheral cannot be opened every read reports the
//! electrical center (512), which normalizes to no motion.

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, info, warn};

use crate::config::AdcConfig;
use crate::error::{Result, TeleopError};
use crate::fusion::IntentVector;

/// Full-scale reading of the 10-bit ADC.
pub const ADC_MAX: u16 = 1023;

/// Reading reported for a centered stick, and for an absent ADC.
pub const ADC_CENTER: u16 = 512;

/// A source of raw 10-bit analog samples.
#[cfg_attr(test, mockall::automock)]
pub trait AnalogSource: Send {
    /// Read one channel, returning a sample in `0..=1023`.
    fn read_channel(&mut self, channel: u8) -> Result<u16>;
}

/// MCP3008 8-channel ADC on SPI0/CE0.
pub struct Mcp3008 {
    spi: Spi,
}

impl Mcp3008 {
    /// Open the ADC on SPI0 chip-select 0.
    ///
    /// # Errors
    ///
    /// Returns `Adc` error if the SPI device is missing or cannot be configured.
    pub fn open(clock_hz: u32) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| TeleopError::Adc(format!("Failed to open SPI0.0: {}", e)))?;
        info!("MCP3008 ADC initialized on SPI0.0 at {} Hz", clock_hz);
        Ok(Self { spi })
    }
}

impl AnalogSource for Mcp3008 {
    fn read_channel(&mut self, channel: u8) -> Result<u16> {
        if channel >= 8 {
            return Err(TeleopError::Adc(format!("Channel {} must be 0-7", channel)));
        }

        // Start bit, single-ended mode + channel, then clock out the result
        let tx_buffer = [0x01, (0x08 | channel) << 4, 0x00];
        let mut rx_buffer = [0u8; 3];

        self.spi
            .transfer(&mut rx_buffer, &tx_buffer)
            .map_err(|e| TeleopError::Adc(format!("SPI transfer failed: {}", e)))?;

        Ok(decode_sample(&rx_buffer))
    }
}

/// Extracts the 10-bit sample from an MCP3008 response frame.
fn decode_sample(rx: &[u8; 3]) -> u16 {
    (((rx[1] & 0x03) as u16) << 8) | rx[2] as u16
}

/// Normalizes a raw X sample. The X channel is wired inverted.
///
/// Because of the inversion a centered stick (512) reads `-1/512` on X
/// rather than exactly zero, well inside any deadzone.
///
/// ```
/// use rover_teleop::adc::normalize_x;
///
/// assert_eq!(normalize_x(512), -1.0 / 512.0);
/// assert!(normalize_x(0) > 0.99);
/// ```
#[must_use]
pub fn normalize_x(raw: u16) -> f64 {
    let raw = raw.min(ADC_MAX) as f64;
    ((ADC_MAX as f64 - raw) - ADC_CENTER as f64) / ADC_CENTER as f64
}

/// Normalizes a raw Y sample.
#[must_use]
pub fn normalize_y(raw: u16) -> f64 {
    let raw = raw.min(ADC_MAX) as f64;
    (raw - ADC_CENTER as f64) / ADC_CENTER as f64
}

/// The analog joystick, present or absent.
#[derive(Default)]
pub enum AdcReader {
    Present {
        source: Box<dyn AnalogSource>,
        x_channel: u8,
        y_channel: u8,
        /// Set after a failed read until the next good one.
        failing: bool,
    },
    #[default]
    Absent,
}

impl std::fmt::Debug for AdcReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdcReader::Present { x_channel, y_channel, .. } => f
                .debug_struct("Present")
                .field("x_channel", x_channel)
                .field("y_channel", y_channel)
                .finish_non_exhaustive(),
            AdcReader::Absent => f.write_str("Absent"),
        }
    }
}

impl AdcReader {
    /// Open the ADC described by `config`, falling back to [`AdcReader::Absent`].
    pub fn open(config: &AdcConfig) -> Self {
        if !config.enabled {
            info!("Analog joystick disabled in config");
            return AdcReader::Absent;
        }

        match Mcp3008::open(config.clock_hz) {
            Ok(adc) => Self::with_source(Box::new(adc), config.x_channel, config.y_channel),
            Err(e) => {
                warn!("Analog joystick not available: {}", e);
                AdcReader::Absent
            }
        }
    }

    /// Wrap an arbitrary sample source.
    #[must_use]
    pub fn with_source(source: Box<dyn AnalogSource>, x_channel: u8, y_channel: u8) -> Self {
        AdcReader::Present {
            source,
            x_channel,
            y_channel,
            failing: false,
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, AdcReader::Present { .. })
    }

    /// Read one raw channel. Never fails: absence or a failed transfer
    /// reports [`ADC_CENTER`].
    pub fn read_axis(&mut self, channel: u8) -> u16 {
        self.sample(channel).unwrap_or(ADC_CENTER)
    }

    /// Read both joystick channels and normalize them into an intent vector.
    ///
    /// Absence or a failed read on either channel yields [`IntentVector::ZERO`].
    pub fn read_intent(&mut self) -> IntentVector {
        let (x_channel, y_channel) = match self {
            AdcReader::Present { x_channel, y_channel, .. } => (*x_channel, *y_channel),
            AdcReader::Absent => return IntentVector::ZERO,
        };

        match (self.sample(x_channel), self.sample(y_channel)) {
            (Some(raw_x), Some(raw_y)) => IntentVector::new(normalize_x(raw_x), normalize_y(raw_y)),
            _ => IntentVector::ZERO,
        }
    }

    /// Whether the last read failed.
    #[must_use]
    pub fn is_failing(&self) -> bool {
        matches!(self, AdcReader::Present { failing: true, .. })
    }

    // Only the first failure after a good read is logged at warn
    fn sample(&mut self, channel: u8) -> Option<u16> {
        let AdcReader::Present { source, failing, .. } = self else {
            return None;
        };

        match source.read_channel(channel) {
            Ok(value) => {
                if *failing {
                    info!("ADC reads recovered on channel {}", channel);
                    *failing = false;
                }
                Some(value.min(ADC_MAX))
            }
            Err(e) => {
                if *failing {
                    debug!("ADC read failed on channel {}: {}", channel, e);
                } else {
                    warn!("ADC read failed on channel {}: {}", channel, e);
                    *failing = true;
                }
                None
            }
        }
    }
}

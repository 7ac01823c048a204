//! Processor configuration
//!
//! Everything fixed for the lifetime of a [`SelfMultEffect`](crate::effect::SelfMultEffect):
//! which gain strategy runs, how buffers are sized and the initial values of
//! the shared parameters. Parameters themselves stay adjustable at runtime.

use serde::{Deserialize, Serialize};

use crate::error::{ProcessorError, ProcessorResult};
use crate::normalize::GainMode;
use crate::types::{CALIBRATION_WINDOW_MS, MAX_DELAY_SECONDS, RMS_LOWEST_FREQUENCY_HZ};

/// Upper end of the volume parameter range
pub const DEFAULT_VOLUME_MAX: f32 = 4.0;

/// Initial values of the shared parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamDefaults {
    /// Delay time in milliseconds
    /// Default: 0.0 (the live signal multiplies itself)
    pub delay_ms: f32,

    /// Power applied to the delayed signal's magnitude
    /// Default: 1.0 (plain ring modulation with the delayed copy)
    pub exponent: f32,

    /// Output volume multiplier
    /// Default: 1.0
    pub volume: f32,

    /// Dry/wet balance, 0.0 = dry, 1.0 = fully processed
    /// Default: 1.0
    pub mix: f32,
}

impl Default for ParamDefaults {
    fn default() -> Self {
        Self {
            delay_ms: 0.0,
            exponent: 1.0,
            volume: 1.0,
            mix: 1.0,
        }
    }
}

/// Startup configuration of the processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Loudness normalization strategy
    /// Default: rms
    pub gain_mode: GainMode,

    /// Channels carrying input; any further buffer channels are cleared
    /// Default: 2
    pub input_channels: usize,

    /// Delay buffer length in seconds
    /// Default: 0.5
    pub max_delay_seconds: f32,

    /// Lowest frequency whose full period fits the RMS window
    /// Default: 60 Hz
    pub rms_lowest_frequency_hz: f32,

    /// Length of a calibration window in milliseconds
    /// Default: 2000
    pub calibration_window_ms: f32,

    /// Upper end of the volume parameter range
    /// Default: 4.0
    pub volume_max: f32,

    /// Initial parameter values
    pub params: ParamDefaults,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            gain_mode: GainMode::default(),
            input_channels: 2,
            max_delay_seconds: MAX_DELAY_SECONDS,
            rms_lowest_frequency_hz: RMS_LOWEST_FREQUENCY_HZ,
            calibration_window_ms: CALIBRATION_WINDOW_MS,
            volume_max: DEFAULT_VOLUME_MAX,
            params: ParamDefaults::default(),
        }
    }
}

impl ProcessorConfig {
    /// Reject values that cannot produce a working processor
    ///
    /// Initial parameter values are not checked; parameters carry no
    /// enforced range.
    pub fn validate(&self) -> ProcessorResult<()> {
        if self.input_channels == 0 {
            return Err(ProcessorError::Config(
                "input_channels must be at least 1".to_string(),
            ));
        }
        if !(self.max_delay_seconds.is_finite() && self.max_delay_seconds > 0.0) {
            return Err(ProcessorError::Config(format!(
                "max_delay_seconds must be positive, got {}",
                self.max_delay_seconds
            )));
        }
        if !(self.rms_lowest_frequency_hz.is_finite() && self.rms_lowest_frequency_hz > 0.0) {
            return Err(ProcessorError::Config(format!(
                "rms_lowest_frequency_hz must be positive, got {}",
                self.rms_lowest_frequency_hz
            )));
        }
        if !(self.calibration_window_ms.is_finite() && self.calibration_window_ms >= 0.0) {
            return Err(ProcessorError::Config(format!(
                "calibration_window_ms must not be negative, got {}",
                self.calibration_window_ms
            )));
        }
        if !(self.volume_max.is_finite() && self.volume_max > 0.0) {
            return Err(ProcessorError::Config(format!(
                "volume_max must be positive, got {}",
                self.volume_max
            )));
        }
        Ok(())
    }
}

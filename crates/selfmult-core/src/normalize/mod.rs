//! Loudness normalization strategies
//!
//! Raising a signal to a power changes its loudness drastically with the
//! exponent. A gain strategy looks at the dry input of each block and yields
//! a per-sample correction factor that keeps the output level stable:
//!
//! - [`RmsNormalizer`]: sliding-window RMS with a soft-attack envelope,
//!   adapts continuously
//! - [`CalibrationGain`]: measures the peak over a fixed calibration window
//!   on request and holds a static factor afterwards

mod calibration;
mod rms;
mod soft_attack;

pub use calibration::{CalibrationGain, CalibrationStatus, CALIBRATION_FLOOR};
pub use rms::RmsNormalizer;
pub use soft_attack::{attack_curve, SoftAttack, ATTACK_TRIGGER_RATIO};

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::ProcessorConfig;
use crate::types::{AudioBuffer, Sample};

/// Which gain strategy the processor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainMode {
    /// Continuous sliding-window RMS normalization
    #[default]
    Rms,
    /// One-shot peak calibration with a static correction factor
    Calibration,
}

impl GainMode {
    pub fn name(&self) -> &'static str {
        match self {
            GainMode::Rms => "rms",
            GainMode::Calibration => "calibration",
        }
    }
}

impl std::str::FromStr for GainMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rms" => Ok(GainMode::Rms),
            "calibration" | "calibrate" => Ok(GainMode::Calibration),
            other => Err(format!("unknown gain mode '{}'", other)),
        }
    }
}

/// Per-sample gain source for the self-multiplication stage
///
/// `analyze` runs once per block on the dry input, before the input is
/// overwritten; `compute_gain` is then queried for every sample of that
/// block. Neither may allocate.
pub trait GainStrategy: Send {
    /// The mode this strategy implements
    fn mode(&self) -> GainMode;

    /// Allocate and clear state for the negotiated format
    fn prepare(&mut self, num_channels: usize, sample_rate: f32, max_block_size: usize);

    /// Consume the dry input frames in `range` of `input`
    fn analyze(&mut self, input: &AudioBuffer, range: Range<usize>, exponent: f32);

    /// Gain for `sample_index` (relative to the analyzed range) of `channel`
    fn compute_gain(&self, channel: usize, sample_index: usize) -> Sample;

    /// Begin a calibration window; strategies without one ignore it
    fn start_calibration(&mut self) {}

    /// Current calibration state, for strategies that calibrate
    fn calibration_status(&self) -> Option<CalibrationStatus> {
        None
    }

    /// Clear state without reallocating
    fn reset(&mut self);

    /// Free buffers
    fn release(&mut self);
}

/// Construct the strategy selected by `config.gain_mode`
pub fn build_strategy(config: &ProcessorConfig) -> Box<dyn GainStrategy> {
    match config.gain_mode {
        GainMode::Rms => Box::new(RmsNormalizer::new(config.rms_lowest_frequency_hz)),
        GainMode::Calibration => Box::new(CalibrationGain::new(config.calibration_window_ms)),
    }
}

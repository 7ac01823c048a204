//! One-shot peak calibration
//!
//! On request, the peak amplitude of the dry input is tracked over a fixed
//! window. When the window closes a static correction
//! `1 / peak^(exponent + 1) · peak` is computed from the exponent current at
//! that moment and held until the next calibration.

use std::ops::Range;

use super::{GainMode, GainStrategy};
use crate::types::{ms_to_samples, AudioBuffer, Sample};

/// Peaks below this are treated as silence and calibrate to zero gain
pub const CALIBRATION_FLOOR: Sample = 1e-4;

/// Snapshot of the calibration state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStatus {
    pub calibrating: bool,
    /// Peak seen so far in the running (or last) window
    pub expected_max_amplitude: Sample,
    /// Correction factor applied to every sample
    pub auto_gain: Sample,
    /// Number of windows that have completed
    pub completed: u64,
}

/// Static gain computed from a timed peak measurement
#[derive(Debug, Clone)]
pub struct CalibrationGain {
    window_ms: f32,
    window_samples: u64,
    num_channels: usize,
    /// Samples analyzed since `prepare`
    clock: u64,
    /// Value of `clock` when the running window started
    started_at: u64,
    calibrating: bool,
    expected_max_amplitude: Sample,
    auto_gain: Sample,
    /// Gain in force before the window closed inside the last analyzed range
    previous_gain: Sample,
    /// Offset in the last analyzed range where `auto_gain` takes over
    switch_at: usize,
    completed: u64,
}

impl CalibrationGain {
    pub fn new(window_ms: f32) -> Self {
        Self {
            window_ms,
            window_samples: 0,
            num_channels: 0,
            clock: 0,
            started_at: 0,
            calibrating: false,
            expected_max_amplitude: 0.0,
            auto_gain: 1.0,
            previous_gain: 1.0,
            switch_at: 0,
            completed: 0,
        }
    }

    /// Length of the calibration window in samples (0 before `prepare`)
    pub fn window_samples(&self) -> u64 {
        self.window_samples
    }

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus {
            calibrating: self.calibrating,
            expected_max_amplitude: self.expected_max_amplitude,
            auto_gain: self.auto_gain,
            completed: self.completed,
        }
    }

    fn finish(&mut self, exponent: f32) {
        let peak = self.expected_max_amplitude;
        self.auto_gain = if peak < CALIBRATION_FLOOR {
            0.0
        } else {
            1.0 / peak.powf(exponent + 1.0) * peak
        };
        self.calibrating = false;
        self.completed += 1;
    }
}

impl GainStrategy for CalibrationGain {
    fn mode(&self) -> GainMode {
        GainMode::Calibration
    }

    fn prepare(&mut self, num_channels: usize, sample_rate: f32, _max_block_size: usize) {
        self.window_samples = ms_to_samples(self.window_ms, sample_rate) as u64;
        self.num_channels = num_channels;
        self.clock = 0;
        self.started_at = 0;
        self.calibrating = false;
        self.expected_max_amplitude = 0.0;
        self.auto_gain = 1.0;
        self.previous_gain = 1.0;
        self.switch_at = 0;
        self.completed = 0;
        log::debug!(
            "CalibrationGain prepared: {} sample window",
            self.window_samples
        );
    }

    fn analyze(&mut self, input: &AudioBuffer, range: Range<usize>, exponent: f32) {
        let frames = range.len() as u64;
        self.switch_at = 0;
        if !self.calibrating {
            self.clock += frames;
            return;
        }

        let remaining = (self.started_at + self.window_samples).saturating_sub(self.clock);
        let take = frames.min(remaining) as usize;
        let measured = range.start..range.start + take;

        let channels = self.num_channels.min(input.num_channels());
        for ch in 0..channels {
            for &x in &input.channel(ch)[measured.clone()] {
                let amplitude = x.abs();
                if amplitude > self.expected_max_amplitude {
                    self.expected_max_amplitude = amplitude;
                }
            }
        }

        self.clock += frames;
        if self.clock - self.started_at >= self.window_samples {
            self.previous_gain = self.auto_gain;
            self.switch_at = take;
            self.finish(exponent);
        }
    }

    #[inline]
    fn compute_gain(&self, _channel: usize, sample_index: usize) -> Sample {
        if sample_index < self.switch_at {
            self.previous_gain
        } else {
            self.auto_gain
        }
    }

    fn start_calibration(&mut self) {
        self.calibrating = true;
        self.started_at = self.clock;
        self.expected_max_amplitude = 0.0;
    }

    fn calibration_status(&self) -> Option<CalibrationStatus> {
        Some(self.status())
    }

    fn reset(&mut self) {
        self.clock = 0;
        self.started_at = 0;
        self.calibrating = false;
        self.expected_max_amplitude = 0.0;
        self.auto_gain = 1.0;
        self.previous_gain = 1.0;
        self.switch_at = 0;
    }

    fn release(&mut self) {
        self.calibrating = false;
        self.num_channels = 0;
    }
}

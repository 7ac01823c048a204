//! Sliding-window RMS normalization
//!
//! Each channel keeps the squares of its last `window_length` input samples
//! in a ring together with their running sum. The gain for a sample is
//!
//! ```text
//! gain = attack_factor / (rms / reference_rms)^exponent
//! ```
//!
//! where `reference_rms` is the RMS of a full-scale sine over the same
//! window, so a full-scale sine is left at unity gain for any exponent.

use std::ops::Range;

use super::soft_attack::{attack_curve, SoftAttack};
use super::{GainMode, GainStrategy};
use crate::types::{rms_window_length, AudioBuffer, Sample, SILENCE_THRESHOLD};

/// RMS state for a single channel
#[derive(Debug, Clone)]
struct RmsChannel {
    squares: Vec<Sample>,
    /// Running sum of `squares`, kept in f64 to limit drift
    sum: f64,
    cursor: usize,
    attack: SoftAttack,
    /// Attack factor applied to the last pushed sample
    attack_factor: Sample,
}

impl RmsChannel {
    fn new(window_length: usize) -> Self {
        Self {
            squares: vec![0.0; window_length],
            sum: 0.0,
            cursor: 0,
            attack: SoftAttack::new(),
            attack_factor: 1.0,
        }
    }

    fn reset(&mut self) {
        self.squares.fill(0.0);
        self.sum = 0.0;
        self.cursor = 0;
        self.attack.reset();
        self.attack_factor = 1.0;
    }

    #[inline]
    fn push(
        &mut self,
        x: Sample,
        exponent: f32,
        curve: &[Sample],
        sample_rate: f64,
        reference_rms: f64,
    ) -> Sample {
        let square = x * x;
        let cursor = self.cursor;

        self.sum += square as f64 - self.squares[cursor] as f64;
        if self.sum < 0.0 {
            self.sum = 0.0;
        }
        self.squares[cursor] = square;

        self.attack.detect(&self.squares, cursor, self.sum as f32);
        let attack_factor = self.attack.next_factor(curve, exponent);
        self.attack_factor = attack_factor;

        self.cursor = if cursor + 1 >= self.squares.len() { 0 } else { cursor + 1 };

        if self.sum < SILENCE_THRESHOLD as f64 {
            return 0.0;
        }
        let ratio = (self.sum / sample_rate).sqrt() / reference_rms;
        (attack_factor as f64 / ratio.powf(exponent as f64)) as Sample
    }
}

/// Continuous loudness normalization from a sliding RMS window
#[derive(Debug, Clone)]
pub struct RmsNormalizer {
    lowest_frequency_hz: f32,
    sample_rate: f32,
    window_length: usize,
    reference_rms: f64,
    channels: Vec<RmsChannel>,
    attack_curve: Vec<Sample>,
    /// Gains computed by the last `analyze`: `coefs[channel][sample]`
    coefs: Vec<Vec<Sample>>,
}

impl RmsNormalizer {
    /// Create an unprepared normalizer whose window spans one period of
    /// `lowest_frequency_hz`
    pub fn new(lowest_frequency_hz: f32) -> Self {
        Self {
            lowest_frequency_hz,
            sample_rate: 0.0,
            window_length: 0,
            reference_rms: 0.0,
            channels: Vec::new(),
            attack_curve: Vec::new(),
            coefs: Vec::new(),
        }
    }

    /// Samples in the RMS window (0 before `prepare`)
    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn sum_of_squares(&self, channel: usize) -> f64 {
        self.channels.get(channel).map_or(0.0, |c| c.sum)
    }

    pub fn attack_in_progress(&self, channel: usize) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|c| c.attack.in_progress())
    }

    /// Soft-attack factor that went into the last gain of `channel`
    pub fn attack_factor(&self, channel: usize) -> Sample {
        self.channels.get(channel).map_or(1.0, |c| c.attack_factor)
    }

    /// Feed one sample through `channel` and return its gain
    ///
    /// `analyze` does this for every sample of a block.
    pub fn push_sample(&mut self, channel: usize, x: Sample, exponent: f32) -> Sample {
        let sample_rate = self.sample_rate as f64;
        let reference_rms = self.reference_rms;
        match self.channels.get_mut(channel) {
            Some(state) => state.push(x, exponent, &self.attack_curve, sample_rate, reference_rms),
            None => 0.0,
        }
    }
}

impl GainStrategy for RmsNormalizer {
    fn mode(&self) -> GainMode {
        GainMode::Rms
    }

    fn prepare(&mut self, num_channels: usize, sample_rate: f32, max_block_size: usize) {
        let window_length = rms_window_length(sample_rate, self.lowest_frequency_hz).max(1);

        self.sample_rate = sample_rate;
        self.window_length = window_length;
        self.reference_rms = (window_length as f64 / (2.0 * sample_rate as f64)).sqrt();
        self.channels = vec![RmsChannel::new(window_length); num_channels];
        self.attack_curve = attack_curve(window_length);
        self.coefs = vec![vec![0.0; max_block_size]; num_channels];

        log::debug!(
            "RmsNormalizer prepared: {} channels, {} sample window",
            num_channels,
            window_length
        );
    }

    fn analyze(&mut self, input: &AudioBuffer, range: Range<usize>, exponent: f32) {
        let sample_rate = self.sample_rate as f64;
        let reference_rms = self.reference_rms;
        let curve = &self.attack_curve;
        let channels = self.channels.len().min(input.num_channels());

        for (ch, (state, coefs)) in self
            .channels
            .iter_mut()
            .zip(self.coefs.iter_mut())
            .enumerate()
            .take(channels)
        {
            let samples = &input.channel(ch)[range.clone()];
            debug_assert!(samples.len() <= coefs.len(), "block longer than prepared");
            for (coef, &x) in coefs.iter_mut().zip(samples) {
                *coef = state.push(x, exponent, curve, sample_rate, reference_rms);
            }
        }
    }

    #[inline]
    fn compute_gain(&self, channel: usize, sample_index: usize) -> Sample {
        self.coefs
            .get(channel)
            .and_then(|c| c.get(sample_index))
            .copied()
            .unwrap_or(0.0)
    }

    fn reset(&mut self) {
        for state in &mut self.channels {
            state.reset();
        }
        for coefs in &mut self.coefs {
            coefs.fill(0.0);
        }
    }

    fn release(&mut self) {
        self.channels = Vec::new();
        self.coefs = Vec::new();
        self.attack_curve = Vec::new();
        self.window_length = 0;
    }
}

//! Common types for SelfMult
//!
//! This module contains the fundamental audio types and constants used
//! throughout the processor, including the planar multi-channel buffer the
//! audio callback works on.

use std::ops::Range;

/// Default sample rate (48kHz - standard professional audio rate)
/// The actual rate is negotiated by the host in `prepare`.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default processing block size in frames
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Longest supported delay in seconds; sizes the delay buffer
pub const MAX_DELAY_SECONDS: f32 = 0.5;

/// Lowest frequency the RMS window must hold at least one full period of
pub const RMS_LOWEST_FREQUENCY_HZ: f32 = 60.0;

/// Length of the auto-gain calibration window
pub const CALIBRATION_WINDOW_MS: f32 = 2000.0;

/// Sum of squares below which a channel counts as silent
pub const SILENCE_THRESHOLD: f32 = 1e-4;

/// Audio sample type (32-bit float)
pub type Sample = f32;

/// Delay buffer capacity for a sample rate: `ceil(max_delay_seconds × sample_rate)`
#[inline]
pub fn delay_capacity(sample_rate: f32, max_delay_seconds: f32) -> usize {
    (max_delay_seconds * sample_rate).ceil().max(1.0) as usize
}

/// RMS window length for a sample rate: `ceil(sample_rate / lowest_frequency)`
#[inline]
pub fn rms_window_length(sample_rate: f32, lowest_frequency_hz: f32) -> usize {
    (sample_rate / lowest_frequency_hz).ceil().max(1.0) as usize
}

/// Convert a time in milliseconds to a whole number of samples (rounded)
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    // NaN and negative values saturate to 0
    (ms / 1000.0 * sample_rate).round() as usize
}

/// A planar buffer of multi-channel audio
///
/// Each channel owns a contiguous run of samples. The working length can be
/// changed without reallocating as long as it stays within the capacity the
/// buffer was created with, which keeps it usable from the audio callback.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    num_frames: usize,
}

impl AudioBuffer {
    /// Create a buffer filled with silence
    pub fn silence(num_channels: usize, num_frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_frames]; num_channels],
            num_frames,
        }
    }

    /// Create a buffer from separate channel vectors
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Self {
        let num_frames = channels.first().map(Vec::len).unwrap_or(0);
        assert!(
            channels.iter().all(|c| c.len() == num_frames),
            "Channel lengths must match"
        );
        Self { channels, num_frames }
    }

    /// Create a buffer from interleaved samples [c0, c1, .., c0, c1, ..]
    pub fn from_interleaved(interleaved: &[Sample], num_channels: usize) -> Self {
        assert!(num_channels > 0, "Need at least one channel");
        assert!(
            interleaved.len() % num_channels == 0,
            "Interleaved length must be a multiple of the channel count"
        );
        let num_frames = interleaved.len() / num_channels;
        let mut buffer = Self::silence(num_channels, num_frames);
        for (frame, chunk) in interleaved.chunks_exact(num_channels).enumerate() {
            for (ch, &sample) in chunk.iter().enumerate() {
                buffer.channels[ch][frame] = sample;
            }
        }
        buffer
    }

    /// Copy samples to an interleaved output buffer
    pub fn to_interleaved(&self, output: &mut [Sample]) {
        let num_channels = self.num_channels();
        assert!(output.len() >= self.num_frames * num_channels);
        for (ch, data) in self.channels.iter().enumerate() {
            for (frame, &sample) in data[..self.num_frames].iter().enumerate() {
                output[frame * num_channels + ch] = sample;
            }
        }
    }

    /// Number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames in the working length
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }

    /// Get one channel's samples
    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index][..self.num_frames]
    }

    /// Get one channel's samples mutably
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index][..self.num_frames]
    }

    /// Zero one channel
    #[inline]
    pub fn clear_channel(&mut self, index: usize) {
        self.channel_mut(index).fill(0.0);
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Newly exposed frames are silenced. Growing past the allocated length
    /// is a caller error and is caught in debug builds.
    #[inline]
    pub fn set_len_from_capacity(&mut self, num_frames: usize) {
        for data in &mut self.channels {
            debug_assert!(
                num_frames <= data.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            if num_frames > data.len() {
                data.resize(num_frames, 0.0);
            }
            if num_frames > self.num_frames {
                data[self.num_frames..num_frames].fill(0.0);
            }
        }
        self.num_frames = num_frames;
    }

    /// Peak absolute amplitude across all channels
    pub fn peak(&self) -> Sample {
        (0..self.num_channels())
            .flat_map(|ch| self.channel(ch).iter())
            .fold(0.0, |acc, s| acc.max(s.abs()))
    }

    /// RMS of one channel over a frame range
    pub fn rms(&self, channel: usize, range: Range<usize>) -> Sample {
        let data = &self.channel(channel)[range];
        if data.is_empty() {
            return 0.0;
        }
        let sum: f64 = data.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / data.len() as f64).sqrt() as Sample
    }
}

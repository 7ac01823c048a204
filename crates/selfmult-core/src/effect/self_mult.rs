//! Self-multiplication effect
//!
//! Multiplies the live signal by a delayed, exponentiated copy of itself and
//! normalizes the result with a configurable gain strategy. Per block:
//!
//! 1. drain UI commands, snapshot parameters
//! 2. clear buffer channels beyond the configured input channels
//! 3. write the dry block into the delay buffer, place the read cursor
//! 4. let the gain strategy analyze the dry block
//! 5. per sample: `wet = sign(x·d)·|x|·|d|^e · gain · volume`,
//!    `out = x·(1 − mix) + wet·mix`
//!
//! Blocks longer than the prepared maximum (or the delay capacity) are split
//! into sub-blocks, so `process` never allocates.

use std::sync::Arc;

use super::{Effect, EffectInfo, ParamValue};
use crate::config::ProcessorConfig;
use crate::engine::{command_channel, self_multiply, DelayBuffer, ProcessorCommand};
use crate::error::{ProcessorError, ProcessorResult};
use crate::normalize::{build_strategy, CalibrationStatus, GainMode, GainStrategy};
use crate::params::{effect_info, SharedParams, NUM_PARAMS};
use crate::types::{delay_capacity, ms_to_samples, AudioBuffer};

/// Map a normalized value onto a parameter's range
fn actual_from_normalized(info: &EffectInfo, index: usize, normalized: f32) -> ProcessorResult<f32> {
    info.params
        .get(index)
        .map(|param| ParamValue::from_normalized(normalized, param).actual)
        .ok_or(ProcessorError::ParamIndexOutOfBounds {
            index,
            count: NUM_PARAMS,
        })
}

fn current_value(info: &EffectInfo, params: &SharedParams, index: usize) -> Option<ParamValue> {
    let param = info.params.get(index)?;
    params
        .get(index)
        .map(|actual| ParamValue::from_actual(actual, param))
}

/// UI-side half of the processor
///
/// Writes parameters and queues one-shot commands. Owned by the control
/// thread; every call is non-blocking.
pub struct SelfMultHandle {
    params: Arc<SharedParams>,
    commands: rtrb::Producer<ProcessorCommand>,
    info: EffectInfo,
}

impl SelfMultHandle {
    /// Shared parameter cells
    pub fn params(&self) -> &Arc<SharedParams> {
        &self.params
    }

    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    pub fn set_delay_ms(&self, value: f32) {
        self.params.set_delay_ms(value);
    }

    pub fn set_exponent(&self, value: f32) {
        self.params.set_exponent(value);
    }

    pub fn set_volume(&self, value: f32) {
        self.params.set_volume(value);
    }

    pub fn set_mix(&self, value: f32) {
        self.params.set_mix(value);
    }

    /// Set a parameter from a normalized knob position (0.0-1.0)
    pub fn set_normalized(&self, index: usize, normalized: f32) -> ProcessorResult<()> {
        let actual = actual_from_normalized(&self.info, index, normalized)?;
        self.params.set(index, actual)
    }

    pub fn get_param(&self, index: usize) -> Option<ParamValue> {
        current_value(&self.info, &self.params, index)
    }

    /// Queue a command for the audio thread
    ///
    /// Fails with [`ProcessorError::CommandQueueFull`] if the audio thread
    /// has not drained earlier commands yet.
    pub fn send(&mut self, cmd: ProcessorCommand) -> ProcessorResult<()> {
        self.commands.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(cmd) => {
                log::warn!("Command queue full, dropping {:?}", cmd);
                ProcessorError::CommandQueueFull(cmd)
            }
        })
    }

    /// Start an auto-gain calibration window on the next block
    pub fn start_calibration(&mut self) -> ProcessorResult<()> {
        self.send(ProcessorCommand::StartCalibration)
    }

    /// Clear all signal state on the next block
    pub fn reset(&mut self) -> ProcessorResult<()> {
        self.send(ProcessorCommand::Reset)
    }
}

/// Audio-side half of the processor
pub struct SelfMultEffect {
    config: ProcessorConfig,
    info: EffectInfo,
    params: Arc<SharedParams>,
    commands: rtrb::Consumer<ProcessorCommand>,
    strategy: Box<dyn GainStrategy>,
    /// `None` until `prepare`, and again after `release`
    delay: Option<DelayBuffer>,
    sample_rate: f32,
    /// Longest run of frames handled in one pass
    chunk_size: usize,
}

impl SelfMultEffect {
    /// Create the effect and its UI handle
    pub fn new(config: ProcessorConfig) -> (Self, SelfMultHandle) {
        let info = effect_info(&config.params, config.volume_max);
        let params = Arc::new(SharedParams::new(&config.params));
        let (producer, consumer) = command_channel();
        let strategy = build_strategy(&config);

        let effect = Self {
            info: info.clone(),
            params: Arc::clone(&params),
            commands: consumer,
            strategy,
            delay: None,
            sample_rate: 0.0,
            chunk_size: 0,
            config,
        };
        let handle = SelfMultHandle {
            params,
            commands: producer,
            info,
        };
        (effect, handle)
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn gain_mode(&self) -> GainMode {
        self.strategy.mode()
    }

    pub fn is_prepared(&self) -> bool {
        self.delay.is_some()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn delay_buffer(&self) -> Option<&DelayBuffer> {
        self.delay.as_ref()
    }

    /// Calibration progress, `None` in RMS mode
    pub fn calibration_status(&self) -> Option<CalibrationStatus> {
        self.strategy.calibration_status()
    }

    fn handle_command(&mut self, cmd: ProcessorCommand) {
        match cmd {
            ProcessorCommand::StartCalibration => self.strategy.start_calibration(),
            ProcessorCommand::Reset => self.reset(),
        }
    }
}

impl Effect for SelfMultEffect {
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> ProcessorResult<()> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ProcessorError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(ProcessorError::InvalidBlockSize(max_block_size));
        }

        let channels = self.config.input_channels;
        let capacity = delay_capacity(sample_rate, self.config.max_delay_seconds);
        let chunk_size = max_block_size.min(capacity);

        self.delay = Some(DelayBuffer::new(channels, capacity));
        self.strategy.prepare(channels, sample_rate, chunk_size);
        self.sample_rate = sample_rate;
        self.chunk_size = chunk_size;

        log::info!(
            "SelfMultEffect prepared: {} Hz, {} channels, max block {}, delay capacity {} samples, {} gain",
            sample_rate,
            channels,
            max_block_size,
            capacity,
            self.strategy.mode().name()
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        while let Ok(cmd) = self.commands.pop() {
            self.handle_command(cmd);
        }

        let Some(delay) = self.delay.as_mut() else {
            return;
        };

        let input_channels = self.config.input_channels;
        for ch in input_channels..buffer.num_channels() {
            buffer.clear_channel(ch);
        }
        let channels = input_channels.min(buffer.num_channels());

        let p = self.params.snapshot();
        let delay_samples = ms_to_samples(p.delay_ms, self.sample_rate);
        let dry = 1.0 - p.mix;

        let frames = buffer.num_frames();
        let mut start = 0;
        while start < frames {
            let end = (start + self.chunk_size).min(frames);
            let range = start..end;

            delay.write(buffer, range.clone());
            delay.set_delay(delay_samples);
            self.strategy.analyze(buffer, range.clone(), p.exponent);

            for ch in 0..channels {
                let samples = &mut buffer.channel_mut(ch)[range.clone()];
                for (i, sample) in samples.iter_mut().enumerate() {
                    let x = *sample;
                    let d = delay.read(ch, i);
                    let gain = self.strategy.compute_gain(ch, i);
                    let wet = self_multiply(x, d, p.exponent) * gain * p.volume;
                    *sample = x * dry + wet * p.mix;
                }
            }

            start = end;
        }
    }

    fn release(&mut self) {
        self.delay = None;
        self.strategy.release();
        self.chunk_size = 0;
        log::info!("SelfMultEffect released");
    }

    fn reset(&mut self) {
        if let Some(delay) = self.delay.as_mut() {
            delay.clear();
        }
        self.strategy.reset();
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn get_param(&self, index: usize) -> Option<ParamValue> {
        current_value(&self.info, &self.params, index)
    }

    fn set_param(&mut self, index: usize, normalized: f32) -> ProcessorResult<()> {
        let actual = actual_from_normalized(&self.info, index, normalized)?;
        self.params.set(index, actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::COMMAND_QUEUE_CAPACITY;
    use crate::params::{PARAM_DELAY, PARAM_EXPONENT};
    use crate::types::DEFAULT_SAMPLE_RATE;
    use std::f32::consts::PI;

    const SR: f32 = DEFAULT_SAMPLE_RATE as f32;

    /// Calibration mode without a calibration run keeps unity gain, which
    /// leaves the raw self-multiplication visible
    fn unity_gain_config(input_channels: usize) -> ProcessorConfig {
        ProcessorConfig {
            gain_mode: GainMode::Calibration,
            input_channels,
            ..Default::default()
        }
    }

    fn prepared(config: ProcessorConfig, max_block: usize) -> (SelfMultEffect, SelfMultHandle) {
        let (mut effect, handle) = SelfMultEffect::new(config);
        effect.prepare(SR, max_block).unwrap();
        (effect, handle)
    }

    fn constant(value: f32, channels: usize, frames: usize) -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![value; frames]; channels])
    }

    fn sine(amplitude: f32, freq: f32, start: usize, frames: usize) -> Vec<f32> {
        (start..start + frames)
            .map(|n| amplitude * (2.0 * PI * freq * n as f32 / SR).sin())
            .collect()
    }

    fn render(effect: &mut SelfMultEffect, signal: &[f32], block: usize) -> Vec<f32> {
        let mut output = Vec::with_capacity(signal.len());
        for chunk in signal.chunks(block) {
            let mut buffer = AudioBuffer::from_channels(vec![chunk.to_vec()]);
            effect.process(&mut buffer);
            output.extend_from_slice(buffer.channel(0));
        }
        output
    }

    fn rms(data: &[f32]) -> f32 {
        (data.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / data.len() as f64).sqrt()
            as f32
    }

    #[test]
    fn test_effect_creation() {
        let (effect, handle) = SelfMultEffect::new(ProcessorConfig::default());
        assert_eq!(effect.info().name, "SelfMult");
        assert_eq!(effect.info().param_count(), NUM_PARAMS);
        assert_eq!(handle.info().param_count(), NUM_PARAMS);
        assert_eq!(effect.gain_mode(), GainMode::Rms);
        assert_eq!(effect.latency_samples(), 0);
        assert!(!effect.is_prepared());
    }

    #[test]
    fn test_prepare_rejects_bad_format() {
        let (mut effect, _handle) = SelfMultEffect::new(ProcessorConfig::default());
        assert!(matches!(
            effect.prepare(0.0, 512),
            Err(ProcessorError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            effect.prepare(f32::NAN, 512),
            Err(ProcessorError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            effect.prepare(SR, 0),
            Err(ProcessorError::InvalidBlockSize(0))
        ));
        assert!(!effect.is_prepared());
    }

    #[test]
    fn test_unprepared_process_is_noop() {
        let (mut effect, _handle) = SelfMultEffect::new(ProcessorConfig::default());
        let mut buffer = constant(0.5, 2, 64);
        effect.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));

        let (mut effect, _handle) = prepared(ProcessorConfig::default(), 64);
        effect.release();
        effect.process(&mut buffer);
        assert!(buffer.channel(1).iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_zero_delay_squares_signal() {
        let (mut effect, _handle) = prepared(unity_gain_config(2), 256);
        let mut buffer = AudioBuffer::from_channels(vec![vec![0.5; 256], vec![-0.5; 256]]);
        effect.process(&mut buffer);

        // sign(x·x) is positive, so both channels come out at 0.25
        for ch in 0..2 {
            for &s in buffer.channel(ch) {
                assert!((s - 0.25).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_sign_follows_product() {
        let (mut effect, handle) = prepared(unity_gain_config(1), 256);
        handle.set_delay_ms(1.0);

        let mut first = constant(-0.5, 1, 128);
        effect.process(&mut first);

        // Live 0.5 against delayed -0.5: negative product
        let mut second = constant(0.5, 1, 128);
        effect.process(&mut second);
        for &s in &second.channel(0)[..48] {
            assert!((s + 0.25).abs() < 1e-6);
        }
        for &s in &second.channel(0)[48..] {
            assert!((s - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_delay_in_samples() {
        let (mut effect, handle) = prepared(unity_gain_config(1), 256);
        // 1 ms at 48 kHz
        handle.set_delay_ms(1.0);

        let mut buffer = constant(0.5, 1, 256);
        effect.process(&mut buffer);

        let out = buffer.channel(0);
        assert!(out[..48].iter().all(|&s| s == 0.0));
        assert!(out[48..].iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_extra_channels_cleared() {
        let (mut effect, _handle) = prepared(unity_gain_config(1), 128);
        let mut buffer = AudioBuffer::from_channels(vec![vec![0.5; 128], vec![0.9; 128], vec![0.3; 128]]);
        effect.process(&mut buffer);

        assert!((buffer.channel(0)[0] - 0.25).abs() < 1e-6);
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
        assert!(buffer.channel(2).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_fewer_channels_than_configured() {
        let (mut effect, _handle) = prepared(unity_gain_config(2), 128);
        let mut buffer = constant(0.5, 1, 128);
        effect.process(&mut buffer);
        assert!((buffer.channel(0)[127] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_mix_and_volume() {
        let (mut effect, handle) = prepared(unity_gain_config(1), 128);
        handle.set_exponent(3.0);
        handle.set_mix(0.0);
        let mut buffer = constant(0.5, 1, 128);
        effect.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));

        handle.set_exponent(1.0);
        handle.set_mix(1.0);
        handle.set_volume(2.0);
        let mut buffer = constant(0.5, 1, 128);
        effect.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|&s| (s - 0.5).abs() < 1e-6));

        handle.set_volume(1.0);
        handle.set_mix(0.5);
        let mut buffer = constant(0.5, 1, 128);
        effect.process(&mut buffer);
        // 0.5·0.5 dry + 0.5·0.25 wet
        assert!(buffer.channel(0).iter().all(|&s| (s - 0.375).abs() < 1e-6));
    }

    #[test]
    fn test_oversize_block_matches_small_blocks() {
        let signal = sine(0.7, 220.0, 0, 3000);

        let (mut small, small_handle) = prepared(ProcessorConfig::default(), 64);
        small_handle.set_delay_ms(2.0);
        small_handle.set_exponent(1.5);
        let mut whole = AudioBuffer::from_channels(vec![signal.clone()]);
        small.process(&mut whole);

        let (mut large, large_handle) = prepared(ProcessorConfig::default(), 4096);
        large_handle.set_delay_ms(2.0);
        large_handle.set_exponent(1.5);
        let reference = render(&mut large, &signal, 4096);

        assert_eq!(whole.channel(0), &reference[..]);
    }

    #[test]
    fn test_rms_normalization_is_level_independent() {
        let exponent = 2.0;
        let frames = 48000;
        let tail = 38400..48000;

        let mut ratios = Vec::new();
        for &amplitude in &[0.2_f32, 0.8] {
            let (mut effect, handle) = prepared(ProcessorConfig::default(), 512);
            handle.set_exponent(exponent);
            let input = sine(amplitude, 120.0, 0, frames);
            let output = render(&mut effect, &input, 512);
            ratios.push(rms(&output[tail.clone()]) / rms(&input[tail.clone()]));
        }

        let relative = ((ratios[0] - ratios[1]) / ratios[1]).abs();
        assert!(relative < 1e-3, "ratios {:?} differ", ratios);
    }

    #[test]
    fn test_silence_stays_silent() {
        let (mut effect, handle) = prepared(ProcessorConfig::default(), 256);
        handle.set_exponent(0.0);
        let mut buffer = constant(0.0, 2, 256);
        effect.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_calibration_through_handle() {
        let (mut effect, mut handle) = prepared(unity_gain_config(2), 512);
        handle.set_exponent(2.0);
        handle.start_calibration().unwrap();

        let mut blocks = 0;
        loop {
            let mut buffer = constant(0.5, 2, 512);
            effect.process(&mut buffer);
            blocks += 1;
            let status = effect.calibration_status().unwrap();
            if !status.calibrating {
                break;
            }
        }
        assert_eq!(blocks, 188);

        let status = effect.calibration_status().unwrap();
        assert_eq!(status.completed, 1);
        assert!((status.auto_gain - 4.0).abs() < 1e-4);

        // 0.5·0.5² brought back to the measured peak
        let mut buffer = constant(0.5, 2, 512);
        effect.process(&mut buffer);
        assert!(buffer.channel(1).iter().all(|&s| (s - 0.5).abs() < 1e-4));
        assert_eq!(effect.calibration_status().unwrap().completed, 1);
    }

    #[test]
    fn test_rms_mode_has_no_calibration() {
        let (mut effect, mut handle) = prepared(ProcessorConfig::default(), 64);
        handle.start_calibration().unwrap();
        effect.process(&mut constant(0.1, 2, 64));
        assert!(effect.calibration_status().is_none());
    }

    #[test]
    fn test_reset_command_clears_delay() {
        let (mut effect, mut handle) = prepared(unity_gain_config(1), 256);
        handle.set_delay_ms(1.0);
        effect.process(&mut constant(0.5, 1, 256));

        handle.reset().unwrap();
        let mut buffer = constant(0.5, 1, 256);
        effect.process(&mut buffer);
        assert!(buffer.channel(0)[..48].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let signal = sine(0.6, 330.0, 0, 2048);

        let (mut effect, handle) = prepared(ProcessorConfig::default(), 256);
        handle.set_delay_ms(3.0);
        let first = render(&mut effect, &signal, 256);

        effect.prepare(SR, 256).unwrap();
        let delay = effect.delay_buffer().unwrap();
        assert_eq!(delay.write_cursor(), 0);
        assert_eq!(delay.read_cursor(), 0);
        assert!(delay.lane(0).iter().all(|&s| s == 0.0));

        let second = render(&mut effect, &signal, 256);
        assert_eq!(first, second);
    }

    #[test]
    fn test_prepare_is_idempotent_in_calibration_mode() {
        let config = ProcessorConfig {
            calibration_window_ms: 10.0,
            ..unity_gain_config(1)
        };
        let signal = sine(0.6, 330.0, 0, 2048);

        let (mut effect, mut handle) = prepared(config, 512);
        handle.set_exponent(2.0);
        let first = render(&mut effect, &signal, 512);

        handle.start_calibration().unwrap();
        render(&mut effect, &[0.5; 1024], 512);
        let status = effect.calibration_status().unwrap();
        assert_eq!(status.completed, 1);
        assert!((status.auto_gain - 4.0).abs() < 1e-4);

        effect.prepare(SR, 512).unwrap();
        let status = effect.calibration_status().unwrap();
        assert_eq!(status.auto_gain, 1.0);
        assert_eq!(status.completed, 0);
        assert!(!status.calibrating);

        let second = render(&mut effect, &signal, 512);
        assert_eq!(first, second);
    }

    #[test]
    fn test_calibrated_gain_starts_at_deadline() {
        let config = ProcessorConfig {
            calibration_window_ms: 10.0,
            ..unity_gain_config(1)
        };
        let (mut effect, mut handle) = prepared(config, 512);
        handle.start_calibration().unwrap();

        // 480-sample window closes inside the first block
        let out = render(&mut effect, &[0.25; 512], 512);
        assert!((out[0] - 0.0625).abs() < 1e-6);
        assert!((out[479] - 0.0625).abs() < 1e-6);
        assert!((out[480] - 0.25).abs() < 1e-5);
        assert!((out[511] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_normalized_params() {
        let (mut effect, handle) = SelfMultEffect::new(ProcessorConfig::default());
        effect.set_param(PARAM_DELAY, 0.5).unwrap();
        assert_eq!(handle.params().delay_ms(), 25.0);

        let value = effect.get_param(PARAM_DELAY).unwrap();
        assert_eq!(value.actual, 25.0);
        assert!((value.normalized - 0.5).abs() < 1e-6);

        handle.set_normalized(PARAM_EXPONENT, 1.0).unwrap();
        assert_eq!(effect.get_param(PARAM_EXPONENT).unwrap().actual, 5.0);

        assert!(matches!(
            effect.set_param(NUM_PARAMS, 0.5),
            Err(ProcessorError::ParamIndexOutOfBounds { .. })
        ));
        assert!(effect.get_param(NUM_PARAMS).is_none());
    }

    #[test]
    fn test_command_queue_overflow() {
        let (_effect, mut handle) = SelfMultEffect::new(ProcessorConfig::default());
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            handle.start_calibration().unwrap();
        }
        assert!(matches!(
            handle.start_calibration(),
            Err(ProcessorError::CommandQueueFull(ProcessorCommand::StartCalibration))
        ));
    }
}

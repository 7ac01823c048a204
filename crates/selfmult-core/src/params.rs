//! Shared parameter surface between the UI thread and the audio callback
//!
//! The UI writes, the audio thread reads once per block. Every parameter is
//! its own lock-free cell holding the `f32` bit pattern in an `AtomicU32`, so
//! a read can be stale but never torn.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::ParamDefaults;
use crate::effect::{EffectInfo, ParamInfo};
use crate::error::{ProcessorError, ProcessorResult};

/// Parameter index: delay time in milliseconds
pub const PARAM_DELAY: usize = 0;
/// Parameter index: self-multiplication exponent
pub const PARAM_EXPONENT: usize = 1;
/// Parameter index: user output volume
pub const PARAM_VOLUME: usize = 2;
/// Parameter index: dry/wet mix
pub const PARAM_MIX: usize = 3;
/// Number of parameters exposed by the processor
pub const NUM_PARAMS: usize = 4;

/// Longest delay the delay parameter can request
pub const MAX_DELAY_MS: f32 = 50.0;
/// Largest exponent the exponent parameter can request
pub const MAX_EXPONENT: f32 = 5.0;

/// An `f32` stored as raw bits in an `AtomicU32`
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Values of all parameters, read once at the start of a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub delay_ms: f32,
    pub exponent: f32,
    pub volume: f32,
    pub mix: f32,
}

/// Parameters shared between the UI collaborator and the audio callback
///
/// Values are stored as-is; no range is enforced here. Out-of-range or NaN
/// values propagate into the signal path (silence or NaN output).
#[derive(Debug)]
pub struct SharedParams {
    delay_ms: AtomicF32,
    exponent: AtomicF32,
    volume: AtomicF32,
    mix: AtomicF32,
}

impl SharedParams {
    pub fn new(defaults: &ParamDefaults) -> Self {
        Self {
            delay_ms: AtomicF32::new(defaults.delay_ms),
            exponent: AtomicF32::new(defaults.exponent),
            volume: AtomicF32::new(defaults.volume),
            mix: AtomicF32::new(defaults.mix),
        }
    }

    pub fn delay_ms(&self) -> f32 {
        self.delay_ms.load()
    }

    pub fn set_delay_ms(&self, value: f32) {
        self.delay_ms.store(value);
    }

    pub fn exponent(&self) -> f32 {
        self.exponent.load()
    }

    pub fn set_exponent(&self, value: f32) {
        self.exponent.store(value);
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn set_volume(&self, value: f32) {
        self.volume.store(value);
    }

    pub fn mix(&self) -> f32 {
        self.mix.load()
    }

    pub fn set_mix(&self, value: f32) {
        self.mix.store(value);
    }

    /// Get a parameter's actual value by index
    pub fn get(&self, index: usize) -> Option<f32> {
        match index {
            PARAM_DELAY => Some(self.delay_ms()),
            PARAM_EXPONENT => Some(self.exponent()),
            PARAM_VOLUME => Some(self.volume()),
            PARAM_MIX => Some(self.mix()),
            _ => None,
        }
    }

    /// Set a parameter's actual value by index
    ///
    /// Fails with `ParamIndexOutOfBounds` if the index is unknown.
    pub fn set(&self, index: usize, value: f32) -> ProcessorResult<()> {
        match index {
            PARAM_DELAY => self.set_delay_ms(value),
            PARAM_EXPONENT => self.set_exponent(value),
            PARAM_VOLUME => self.set_volume(value),
            PARAM_MIX => self.set_mix(value),
            _ => {
                return Err(ProcessorError::ParamIndexOutOfBounds {
                    index,
                    count: NUM_PARAMS,
                })
            }
        }
        Ok(())
    }

    /// Read every parameter once
    #[inline]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            delay_ms: self.delay_ms(),
            exponent: self.exponent(),
            volume: self.volume(),
            mix: self.mix(),
        }
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new(&ParamDefaults::default())
    }
}

/// Build the effect description for the processor's parameters
pub fn effect_info(defaults: &ParamDefaults, volume_max: f32) -> EffectInfo {
    EffectInfo::new("SelfMult", "Modulation")
        .with_param(
            ParamInfo::new("Delay", defaults.delay_ms)
                .with_range(0.0, MAX_DELAY_MS)
                .with_unit("ms"),
        )
        .with_param(ParamInfo::new("Exponent", defaults.exponent).with_range(0.0, MAX_EXPONENT))
        .with_param(
            ParamInfo::new("Volume", defaults.volume)
                .with_range(0.0, volume_max)
                .with_unit("×"),
        )
        .with_param(ParamInfo::new("Mix", defaults.mix).with_range(0.0, 1.0))
}

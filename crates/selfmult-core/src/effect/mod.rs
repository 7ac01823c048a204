//! Effect interface and parameter descriptions
//!
//! The host-facing surface of the processor: a lifecycle trait
//! (prepare → process* → release) plus parameter metadata so a UI can map
//! normalized knob positions (0.0-1.0) onto actual values.

mod self_mult;

pub use self_mult::{SelfMultEffect, SelfMultHandle};

use crate::error::ProcessorResult;
use crate::types::AudioBuffer;

/// Information about an effect parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name for display
    pub name: String,
    /// Default value (actual, within `min..=max`)
    pub default: f32,
    /// Minimum value
    pub min: f32,
    /// Maximum value
    pub max: f32,
    /// Unit label (e.g., "ms", "%")
    pub unit: String,
}

impl Default for ParamInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: 0.0,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }
}

impl ParamInfo {
    /// Create a new parameter info with name and default value
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            ..Default::default()
        }
    }

    /// Set the value range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Current parameter value with both representations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValue {
    /// Normalized value (0.0-1.0)
    pub normalized: f32,
    /// Actual value after range mapping
    pub actual: f32,
}

impl ParamValue {
    /// Create from normalized value with the given param info
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        let actual = info.min + normalized * (info.max - info.min);
        Self { normalized, actual }
    }

    /// Create from an actual value; the normalized side is clamped to 0.0-1.0
    pub fn from_actual(actual: f32, info: &ParamInfo) -> Self {
        let span = info.max - info.min;
        let normalized = if span > 0.0 {
            ((actual - info.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { normalized, actual }
    }
}

/// Information about an effect
#[derive(Debug, Clone)]
pub struct EffectInfo {
    /// Effect name for display
    pub name: String,
    /// Effect category (e.g., "Modulation")
    pub category: String,
    /// Parameter descriptions, in index order
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    /// Create a new effect info
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to this effect
    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Get the number of parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// The core effect trait
///
/// A host calls `prepare` whenever sample rate or block size is
/// (re)negotiated, then `process` once per audio period from its real-time
/// thread, and `release` when playback stops. Only `process` runs on the
/// audio thread; it must not allocate, block or fail.
pub trait Effect: Send {
    /// Allocate and clear all internal state for the negotiated format
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> ProcessorResult<()>;

    /// Process a multi-channel buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Free internal buffers; `process` is a no-op until the next `prepare`
    fn release(&mut self);

    /// Clear internal state without reallocating
    fn reset(&mut self);

    /// Processing latency in samples
    fn latency_samples(&self) -> u32 {
        0
    }

    /// Get information about this effect (name, category, parameters)
    fn info(&self) -> &EffectInfo;

    /// Get the current value of a parameter
    fn get_param(&self, index: usize) -> Option<ParamValue>;

    /// Set a parameter by index (normalized value 0.0-1.0)
    fn set_param(&mut self, index: usize, normalized: f32) -> ProcessorResult<()>;
}

//! Error types for the self-multiplication processor
//!
//! Only the control path produces errors: host negotiation (`prepare`),
//! parameter access by index and the UI command queue. The audio callback
//! itself never fails.

use thiserror::Error;

use crate::engine::ProcessorCommand;

/// Errors that can occur outside the audio callback
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Host negotiated a sample rate that is zero, negative or not finite
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    /// Host negotiated a zero block size
    #[error("Invalid maximum block size: {0}")]
    InvalidBlockSize(usize),

    /// Parameter index out of bounds
    #[error("Parameter index {index} out of bounds (has {count} params)")]
    ParamIndexOutOfBounds { index: usize, count: usize },

    /// The UI -> audio command queue is full
    #[error("Command queue full, dropped {0:?}")]
    CommandQueueFull(ProcessorCommand),

    /// Configuration values that cannot produce a working processor
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for processor control operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;

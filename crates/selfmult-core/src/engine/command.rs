//! Lock-free command queue from the UI thread to the audio callback
//!
//! Continuous parameters travel through atomic cells (see `params`). One-shot
//! actions such as "calibrate now" go through this `rtrb` SPSC ring buffer
//! and are drained at the start of every processed block, so they are never
//! lost and never applied mid-block.

/// Commands sent from the UI thread to the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorCommand {
    /// Start a new auto-gain calibration window
    StartCalibration,
    /// Clear delay, loudness and calibration state without reallocating
    Reset,
}

/// Capacity of the command queue
///
/// Commands are rare one-shot user actions; a few slots absorb a burst of
/// repeated button presses between two audio periods.
pub const COMMAND_QUEUE_CAPACITY: usize = 16;

/// Create a new command channel (producer/consumer pair)
///
/// Returns `(Producer, Consumer)` where:
/// - Producer: Send side, owned by UI thread
/// - Consumer: Receive side, owned by audio thread
pub fn command_channel() -> (
    rtrb::Producer<ProcessorCommand>,
    rtrb::Consumer<ProcessorCommand>,
) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

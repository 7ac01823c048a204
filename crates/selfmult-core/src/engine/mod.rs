//! Signal-path building blocks
//!
//! - `delay_buffer`: per-channel circular buffer with block write / offset read
//! - `self_multiply`: signed power-law combination of live and delayed samples
//! - `command`: lock-free UI → audio command queue

mod command;
mod delay_buffer;
mod self_multiply;

pub use command::{command_channel, ProcessorCommand, COMMAND_QUEUE_CAPACITY};
pub use delay_buffer::DelayBuffer;
pub use self_multiply::{product_sign, self_multiply};

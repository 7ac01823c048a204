//! SelfMult Core - real-time self-multiplication audio effect
//!
//! Multiplies a signal by a delayed, exponentiated copy of itself and keeps
//! the result at a stable loudness with one of two gain strategies.

pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod params;
pub mod types;

pub use effect::{Effect, SelfMultEffect, SelfMultHandle};
pub use error::{ProcessorError, ProcessorResult};
pub use types::*;

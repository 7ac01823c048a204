//! Processor configuration
//!
//! Startup-time settings for the processor and the renderer:
//!
//! - Generic YAML config loading/saving
//! - Standard config file location
//! - [`ProcessorConfig`]: gain strategy, buffer sizing, initial parameters
//!
//! # Usage
//!
//! ```ignore
//! use selfmult_core::config::{default_config_path, load_config, ProcessorConfig};
//!
//! let config: ProcessorConfig = load_config(&default_config_path("processor.yaml"));
//! config.validate()?;
//! ```

mod io;
mod paths;
mod processor;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use processor::{ParamDefaults, ProcessorConfig, DEFAULT_VOLUME_MAX};

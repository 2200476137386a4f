//! Configuration Management
//!
//! Unified configuration with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/sos/config.toml)
//! 3. Environment variables (SOS_*)
//! 4. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;

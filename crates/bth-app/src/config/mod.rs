//! Configuration file parsing for the harness
//!
//! Supports:
//! - `.btharness/config.toml` - Global settings

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings, save_settings};
pub use types::*;

//! Configuration management for LayerFlow.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use layerflow_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/layerflow.toml");
//! config.load_or_create().unwrap();
//!
//! // Read settings
//! println!("Renderer timeout: {}s", config.settings().renderer.timeout_secs);
//!
//! // Modify a setting
//! config.settings_mut().renderer.timeout_secs = 300;
//!
//! // Save just the renderer section atomically
//! config.update_section(ConfigSection::Renderer).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, DetectionSettings, LoggingSettings, PathSettings, QueueSettings,
    RendererSettings, Settings,
};

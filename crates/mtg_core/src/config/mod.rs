//! Configuration management for Meeting Analyzer.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//! - Hardware profiles and field overrides, resolved once per run
//!
//! # Example
//!
//! ```no_run
//! use mtg_core::config::{resolve_settings, ConfigManager, Overrides, Profile};
//!
//! let mut config = ConfigManager::new("meeting-analyzer.toml");
//! config.load_or_create().unwrap();
//!
//! let overrides = Overrides {
//!     text_model: Some("llama-3.2-3b".to_string()),
//!     ..Overrides::default()
//! };
//! let settings = resolve_settings(config.into_settings(), Some(Profile::Laptop), &overrides).unwrap();
//! println!("Vision model: {}", settings.inference.vision_model);
//! ```

mod manager;
mod profiles;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use profiles::{resolve_settings, Overrides, Profile};
pub use settings::{
    ConfigSection, FrameSettings, InferenceSettings, LoggingSettings, OutputSettings,
    PathSettings, Settings, TranscriptionSettings,
};

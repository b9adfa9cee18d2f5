//! # inquest-settings
//!
//! Layered configuration for the Inquest engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`InquestSettings::default()`]
//! 2. **Settings file**: `~/.inquest/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `INQUEST_*` overrides (highest priority)
//!
//! The file may be partial: only the keys it names override defaults, objects
//! merge recursively, arrays and primitives replace, and `null` values are
//! skipped.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{
    ContextSettings, EngineSettings, InquestSettings, LogFormat, LoggingSettings,
    ProviderSettings, RetrySettings, ServerSettings,
};

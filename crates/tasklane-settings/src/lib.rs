//! # tasklane-settings
//!
//! Layered configuration for tasklane.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TasklaneSettings::default()`]
//! 2. **User file**: `~/.tasklane/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TASKLANE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path,
    load_settings_with_env, settings_path,
};
pub use types::{DatabaseSettings, LoggingSettings, TasklaneSettings, tasklane_home};

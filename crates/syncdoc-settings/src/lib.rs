//! # syncdoc-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SyncSettings::default()`]
//! 2. **Settings file**: `~/.syncdoc/settings.json` or an explicit path,
//!    deep-merged over defaults
//! 3. **Environment variables**: `SYNCDOC_*` overrides
//!
//! Command-line flags are applied by the binary on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::{DocumentSettings, LoggingSettings, ServerSettings, SessionSettings, SyncSettings};

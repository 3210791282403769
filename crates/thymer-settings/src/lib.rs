//! # thymer-settings
//!
//! Desktop bridge configuration, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DesktopSettings::default()`]
//! 2. **User file**: `$XDG_CONFIG_HOME/thymer-desktop/config.json` (deep-merged over defaults)
//! 3. **Environment variables**: `THYMER_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    config_dir, deep_merge, load_settings, load_settings_from_path, save_settings, settings_path,
};
pub use types::{DesktopSettings, ServerSettings};

//! # revo-settings
//!
//! Configuration management with layered sources for Revo clients.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RevoSettings::default()`]
//! 2. **User file**: `~/.revo/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `REVO_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use revo_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("real-time endpoint: {}", settings.realtime.url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_dir, settings_path};
pub use types::*;

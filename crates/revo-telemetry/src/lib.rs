//! # revo-telemetry
//!
//! Installs the global `tracing` subscriber from [`LoggingSettings`].
//!
//! `RUST_LOG` wins when set; otherwise the filter is built from the
//! configured level plus per-module overrides. Output goes to stderr so
//! command output on stdout stays machine-readable.

#![deny(unsafe_code)]

use revo_settings::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Errors from telemetry initialisation.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Build the `EnvFilter` directive string for the given settings.
///
/// Format: `<level>[,<module>=<level>]*`.
pub fn filter_directives(settings: &LoggingSettings) -> String {
    let mut directives = settings.level.as_directive().to_string();
    for (module, level) in &settings.module_levels {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(level.as_directive());
    }
    directives
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let directives = filter_directives(settings);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let (json_layer, text_layer) = if settings.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

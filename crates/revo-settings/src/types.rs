//! Settings type definitions.
//!
//! All types use camelCase field names and `#[serde(default)]`, so a
//! partial settings file only needs the values it changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevoSettings {
    /// Settings schema version.
    pub version: String,
    /// Real-time connection settings.
    pub realtime: RealtimeSettings,
    /// REST API settings.
    pub api: ApiSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for RevoSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            realtime: RealtimeSettings::default(),
            api: ApiSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RevoSettings {
    /// Reject values the clients cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let rt = &self.realtime;
        if rt.url.is_empty() {
            return Err(SettingsError::InvalidValue("realtime.url must not be empty".into()));
        }
        if rt.backoff_factor < 1.0 || !rt.backoff_factor.is_finite() {
            return Err(SettingsError::InvalidValue(format!(
                "realtime.backoffFactor must be >= 1.0, got {}",
                rt.backoff_factor
            )));
        }
        if rt.queue_capacity == 0 {
            return Err(SettingsError::InvalidValue("realtime.queueCapacity must be > 0".into()));
        }
        if rt.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime.heartbeatIntervalMs must be > 0".into(),
            ));
        }
        if self.api.base_url.is_empty() {
            return Err(SettingsError::InvalidValue("api.baseUrl must not be empty".into()));
        }
        if self.api.retry_attempts == 0 {
            return Err(SettingsError::InvalidValue("api.retryAttempts must be >= 1".into()));
        }
        Ok(())
    }
}

/// Real-time (WebSocket) connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Channels joined on every successful connect.
    pub channels: Vec<String>,
    /// Reconnect attempts before the connection is marked failed.
    pub max_reconnect_attempts: u32,
    /// Base reconnect delay in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_factor: f64,
    /// Upper bound on a single reconnect delay in milliseconds.
    pub max_reconnect_delay_ms: u64,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Timeout for opening the transport in milliseconds.
    pub connect_timeout_ms: u64,
    /// Capacity of the outbound queue used while disconnected.
    pub queue_capacity: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            channels: vec!["agents".to_string(), "metrics".to_string()],
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
            backoff_factor: 2.0,
            max_reconnect_delay_ms: 30_000,
            heartbeat_interval_ms: 30_000,
            connect_timeout_ms: 10_000,
            queue_capacity: 100,
        }
    }
}

/// REST API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL every endpoint is joined onto.
    pub base_url: String,
    /// Static bearer token; takes precedence over the token file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Token file path (defaults to `~/.revo/auth.json`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    /// Total attempts per request, including the first.
    pub retry_attempts: u32,
    /// Linear retry delay step in milliseconds.
    pub retry_delay_ms: u64,
    /// Per-attempt timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            token: None,
            token_file: None,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug output.
    Debug,
    /// Default level.
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a level name (case-insensitive, `warning` accepted).
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Global level.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module overrides, e.g. `{"revo_realtime": "debug"}`.
    pub module_levels: BTreeMap<String, LogLevel>,
}

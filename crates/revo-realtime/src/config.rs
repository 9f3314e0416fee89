//! Connection configuration.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use revo_settings::RealtimeSettings;

use crate::backoff::Backoff;

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Optional auth token, appended as a `token` query parameter.
    pub auth_token: Option<String>,
    /// Channels announced in a `subscribe` envelope on every connect.
    pub channels: Vec<String>,
    /// Reconnect attempts before entering `Failed`.
    pub max_reconnect_attempts: u32,
    /// Delay policy between reconnect attempts.
    pub backoff: Backoff,
    /// Period of the outbound `ping` heartbeat. Zero disables it.
    pub heartbeat_interval: Duration,
    /// Timeout for opening the transport.
    pub connect_timeout: Duration,
    /// Maximum messages held while not connected.
    pub queue_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::from(&RealtimeSettings::default()).with_channels(Vec::<String>::new())
    }
}

impl RealtimeConfig {
    /// Defaults pointed at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the auth token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the channels announced on connect.
    #[must_use]
    pub fn with_channels<S: Into<String>>(mut self, channels: impl IntoIterator<Item = S>) -> Self {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the reconnect budget.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the heartbeat period. Zero disables the heartbeat.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the transport open timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the offline queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// URL actually dialled: `url` plus `token=<percent-encoded>` when an
    /// auth token is set.
    pub fn endpoint(&self) -> String {
        match self.auth_token.as_deref() {
            Some(token) if !token.is_empty() => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!(
                    "{}{sep}token={}",
                    self.url,
                    utf8_percent_encode(token, NON_ALPHANUMERIC)
                )
            }
            _ => self.url.clone(),
        }
    }
}

impl From<&RealtimeSettings> for RealtimeConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            url: settings.url.clone(),
            auth_token: None,
            channels: settings.channels.clone(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            backoff: Backoff::new(
                Duration::from_millis(settings.reconnect_delay_ms),
                settings.backoff_factor,
                Duration::from_millis(settings.max_reconnect_delay_ms),
            ),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            queue_capacity: settings.queue_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_without_token() {
        let config = RealtimeConfig::new("ws://localhost:8000/ws");
        assert_eq!(config.endpoint(), "ws://localhost:8000/ws");
    }

    #[test]
    fn endpoint_appends_token() {
        let config = RealtimeConfig::new("ws://localhost:8000/ws").with_auth_token("abc123");
        assert_eq!(config.endpoint(), "ws://localhost:8000/ws?token=abc123");
    }

    #[test]
    fn endpoint_uses_ampersand_with_existing_query() {
        let config = RealtimeConfig::new("ws://h/ws?client=cli").with_auth_token("t");
        assert_eq!(config.endpoint(), "ws://h/ws?client=cli&token=t");
    }

    #[test]
    fn endpoint_percent_encodes_token() {
        let config = RealtimeConfig::new("ws://h/ws").with_auth_token("a b/c=");
        assert_eq!(config.endpoint(), "ws://h/ws?token=a%20b%2Fc%3D");
    }

    #[test]
    fn empty_token_is_ignored() {
        let config = RealtimeConfig::new("ws://h/ws").with_auth_token("");
        assert_eq!(config.endpoint(), "ws://h/ws");
    }

    #[test]
    fn from_settings_maps_fields() {
        let settings = RealtimeSettings {
            reconnect_delay_ms: 250,
            backoff_factor: 1.5,
            max_reconnect_delay_ms: 4000,
            heartbeat_interval_ms: 5000,
            ..Default::default()
        };
        let config = RealtimeConfig::from(&settings);
        assert_eq!(config.url, settings.url);
        assert_eq!(config.channels, vec!["agents", "metrics"]);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.backoff.base_delay, Duration::from_millis(250));
        assert!((config.backoff.factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.backoff.max_delay, Duration::from_secs(4));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 100);
    }

    #[test]
    fn new_has_no_channels() {
        let config = RealtimeConfig::new("ws://h/ws");
        assert!(config.channels.is_empty());
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }
}

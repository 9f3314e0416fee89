//! Client configuration.

use std::time::Duration;

use revo_settings::ApiSettings;

/// Configuration for an [`ApiClient`](crate::ApiClient).
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL that relative endpoints are joined onto.
    pub base_url: String,
    /// Static bearer token seeded into the default in-memory token store.
    pub token: Option<String>,
    /// Total attempts per request, including the first (minimum 1).
    pub retry_attempts: u32,
    /// Linear retry step: attempt `n` waits `retry_delay * n` before the next.
    pub retry_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ApiSettings::default())
    }
}

impl ApiConfig {
    /// Defaults pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the static token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the total attempt count.
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the linear retry step.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            token: settings.token.clone(),
            retry_attempts: settings.retry_attempts,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            timeout: Duration::from_millis(settings.request_timeout_ms),
            user_agent: format!("revo/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

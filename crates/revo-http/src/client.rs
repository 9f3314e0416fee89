//! REST client: one `request` entry point with retries, typed errors and a
//! reachability flag.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::token::{MemoryTokenStore, TokenStore};

const JSON: &str = "application/json";

/// Per-request options.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// JSON body.
    pub body: Option<Value>,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Per-attempt timeout override.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options with a JSON body.
    pub fn json(body: &impl Serialize) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(Self {
            body: Some(body),
            ..Self::default()
        })
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Override the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Typed JSON REST client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ApiConfig>,
    tokens: Arc<dyn TokenStore>,
    reachable: Arc<watch::Sender<bool>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("reachable", &self.is_reachable())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client whose token comes from `config.token`.
    pub fn new(config: ApiConfig) -> Self {
        let http = match reqwest::Client::builder().user_agent(&config.user_agent).build() {
            Ok(http) => http,
            Err(e) => {
                warn!(
                    user_agent = %config.user_agent,
                    error = %e,
                    "failed to build HTTP client, falling back to defaults"
                );
                reqwest::Client::default()
            }
        };
        let (reachable, _) = watch::channel(true);
        Self {
            http,
            tokens: Arc::new(MemoryTokenStore::new(config.token.clone())),
            config: Arc::new(config),
            reachable: Arc::new(reachable),
        }
    }

    /// Replace the token source.
    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = store;
        self
    }

    /// Token source in use.
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Configuration in use.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Whether the last attempt got an HTTP response.
    pub fn is_reachable(&self) -> bool {
        *self.reachable.borrow()
    }

    /// Watch channel of the reachability flag.
    pub fn reachability(&self) -> watch::Receiver<bool> {
        self.reachable.subscribe()
    }

    /// `GET endpoint`.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(Method::GET, endpoint, RequestOptions::default())
            .await
    }

    /// `POST endpoint` with a JSON body.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, endpoint, RequestOptions::json(body)?)
            .await
    }

    /// `PUT endpoint` with a JSON body.
    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, endpoint, RequestOptions::json(body)?)
            .await
    }

    /// `DELETE endpoint`.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, endpoint, RequestOptions::default())
            .await
    }

    /// Perform a request and decode the JSON response into `T`.
    ///
    /// 5xx, network errors and timeouts are retried up to
    /// `retry_attempts` total attempts with a linearly growing delay; any
    /// other error is returned immediately. An empty body decodes as `null`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.url_for(endpoint)?;
        let max_attempts = self.config.retry_attempts.max(1);
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let mut attempt = 1;
        loop {
            match self.attempt::<T>(&method, &url, &options, timeout).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry_delay * attempt;
                    warn!(
                        %method,
                        url = %url,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(
                        %method,
                        url = %url,
                        attempt,
                        kind = e.error_kind(),
                        error = %e,
                        "request failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &Url,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .timeout(timeout)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON);
        if let Some(token) = self.tokens.token() {
            builder = builder.bearer_auth(token);
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.set_reachable(false);
                return Err(classify(&e, timeout));
            }
        };
        self.set_reachable(true);

        let status = response.status();
        let text = response.text().await.map_err(|e| classify(&e, timeout))?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &text));
        }
        decode_body(&text)
    }

    fn url_for(&self, endpoint: &str) -> Result<Url, ApiError> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))
    }

    fn set_reachable(&self, reachable: bool) {
        let changed = self.reachable.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if changed {
            info!(base_url = %self.config.base_url, reachable, "API reachability changed");
        }
    }
}

fn classify(err: &reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(timeout)
    } else if err.is_builder() {
        ApiError::InvalidUrl(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let decoded = if text.trim().is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_str(text)
    };
    decoded.map_err(|e| ApiError::Decode(e.to_string()))
}

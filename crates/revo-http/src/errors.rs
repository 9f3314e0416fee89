use std::time::Duration;

use serde_json::Value;

/// Typed error hierarchy for REST calls.
/// 4xx and malformed responses are final; 5xx, network failures and
/// timeouts are retried before surfacing.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    // Final
    #[error("client error {status}: {message}")]
    Client {
        status: u16,
        message: String,
        /// Parsed JSON error body, when the server sent one.
        body: Option<Value>,
    },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("failed to encode request body: {0}")]
    Encode(String),
    #[error("failed to decode response: {0}")]
    Decode(String),

    // Retryable
    #[error("server error {status}: {message}")]
    Server {
        status: u16,
        message: String,
        /// Parsed JSON error body, when the server sent one.
        body: Option<Value>,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Network(_) | Self::Timeout(_))
    }

    /// No HTTP response was received.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Client { .. } => "client_error",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Encode(_) => "encode_error",
            Self::Decode(_) => "decode_error",
            Self::Server { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Classify a non-2xx response. The message comes from the JSON body's
    /// `message`, `error` or `detail` field, else the raw text, else the
    /// status's canonical reason.
    pub fn from_status(status: u16, text: &str) -> Self {
        let body: Option<Value> = serde_json::from_str(text).ok();
        let message = body
            .as_ref()
            .and_then(extract_message)
            .or_else(|| {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| truncate(trimmed, MAX_MESSAGE_CHARS))
            })
            .unwrap_or_else(|| canonical_reason(status).to_string());

        if (500..600).contains(&status) {
            Self::Server {
                status,
                message,
                body,
            }
        } else {
            Self::Client {
                status,
                message,
                body,
            }
        }
    }
}

const MAX_MESSAGE_CHARS: usize = 500;

fn extract_message(body: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| match body.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            other => Some(other.to_string()),
        })
}

fn canonical_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn retryable_classification() {
        assert!(ApiError::from_status(500, "").is_retryable());
        assert!(ApiError::from_status(503, "").is_retryable());
        assert!(ApiError::Network("refused".into()).is_retryable());
        assert!(ApiError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ApiError::from_status(404, "").is_retryable());
        assert!(!ApiError::from_status(401, "").is_retryable());
        assert!(!ApiError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn message_from_json_fields() {
        let err = ApiError::from_status(400, r#"{"message": "name is required"}"#);
        assert_matches!(err, ApiError::Client { status: 400, ref message, body: Some(_) } if message == "name is required");

        let err = ApiError::from_status(404, r#"{"detail": "agent not found"}"#);
        assert_matches!(err, ApiError::Client { ref message, .. } if message == "agent not found");

        let err = ApiError::from_status(502, r#"{"error": "upstream down"}"#);
        assert_matches!(err, ApiError::Server { status: 502, ref message, .. } if message == "upstream down");
    }

    #[test]
    fn nested_error_object() {
        let err = ApiError::from_status(422, r#"{"error": {"code": "E1", "message": "bad field"}}"#);
        assert_matches!(err, ApiError::Client { ref message, .. } if message == "bad field");
    }

    #[test]
    fn non_string_detail_is_stringified() {
        let err = ApiError::from_status(422, r#"{"detail": [{"loc": ["body"], "msg": "x"}]}"#);
        assert_matches!(err, ApiError::Client { ref message, .. } if message.contains("\"msg\":\"x\""));
    }

    #[test]
    fn message_from_plain_text() {
        let err = ApiError::from_status(503, "  service unavailable  ");
        assert_matches!(err, ApiError::Server { ref message, body: None, .. } if message == "service unavailable");
    }

    #[test]
    fn message_falls_back_to_reason() {
        let err = ApiError::from_status(500, "");
        assert_matches!(err, ApiError::Server { ref message, .. } if message == "Internal Server Error");
        let err = ApiError::from_status(400, "{}");
        assert_matches!(err, ApiError::Client { ref message, .. } if message == "{}");
    }

    #[test]
    fn long_text_is_truncated() {
        let text = "x".repeat(2000);
        let err = ApiError::from_status(500, &text);
        assert_matches!(err, ApiError::Server { ref message, .. } if message.chars().count() == MAX_MESSAGE_CHARS + 1);
    }

    #[test]
    fn status_and_kind() {
        assert_eq!(ApiError::from_status(418, "").status(), Some(418));
        assert_eq!(ApiError::Network("x".into()).status(), None);
        assert_eq!(ApiError::from_status(500, "").error_kind(), "server_error");
        assert_eq!(ApiError::Timeout(Duration::ZERO).error_kind(), "timeout");
        assert!(ApiError::Timeout(Duration::ZERO).is_offline());
        assert!(!ApiError::from_status(500, "").is_offline());
    }

    #[test]
    fn display_includes_status() {
        let err = ApiError::from_status(404, r#"{"message": "missing"}"#);
        assert_eq!(err.to_string(), "client error 404: missing");
    }
}

//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RevoSettings::default()`]
//! 2. If `~/.revo/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{LogLevel, RevoSettings};

/// Directory holding Revo client state (`~/.revo`).
pub fn settings_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".revo")
}

/// Resolve the path to the settings file (`~/.revo/settings.json`).
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RevoSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RevoSettings> {
    let defaults = serde_json::to_value(RevoSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RevoSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `REVO_*` environment variable overrides.
///
/// Invalid values are ignored with a warning (file/default value is kept).
pub fn apply_env_overrides(settings: &mut RevoSettings) {
    // ── Real-time ───────────────────────────────────────────────────
    if let Some(v) = read_env_string("REVO_WS_URL") {
        settings.realtime.url = v;
    }
    if let Some(v) = read_env_string("REVO_WS_CHANNELS") {
        settings.realtime.channels = parse_list(&v);
    }
    if let Some(v) = read_env_u64("REVO_HEARTBEAT_INTERVAL_MS", 1000, 600_000) {
        settings.realtime.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("REVO_MAX_RECONNECT_ATTEMPTS", 0, 1000) {
        settings.realtime.max_reconnect_attempts = v as u32;
    }
    if let Some(v) = read_env_u64("REVO_RECONNECT_DELAY_MS", 10, 600_000) {
        settings.realtime.reconnect_delay_ms = v;
    }

    // ── REST API ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("REVO_API_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_env_string("REVO_API_TOKEN") {
        settings.api.token = Some(v);
    }
    if let Some(v) = read_env_u64("REVO_RETRY_ATTEMPTS", 1, 20) {
        settings.api.retry_attempts = v as u32;
    }
    if let Some(v) = read_env_u64("REVO_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.api.request_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("REVO_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => tracing::warn!(key = "REVO_LOG_LEVEL", value = %v, "invalid log level, ignoring"),
        }
    }
    if let Some(v) = read_env_bool("REVO_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, dropping empty items.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"realtime": {"url": "ws://a", "queueCapacity": 100}});
        let source = serde_json::json!({"realtime": {"url": "ws://b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["realtime"]["url"], "ws://b");
        assert_eq!(merged["realtime"]["queueCapacity"], 100);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"channels": ["agents", "metrics"]});
        let source = serde_json::json!({"channels": ["alerts"]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["channels"], serde_json::json!(["alerts"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        let defaults = RevoSettings::default();
        assert_eq!(settings.version, defaults.version);
        assert_eq!(settings.realtime.queue_capacity, defaults.realtime.queue_capacity);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"realtime": {"maxReconnectAttempts": 8, "channels": ["alerts"]},
                "api": {"retryAttempts": 5}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.realtime.max_reconnect_attempts, 8);
        assert_eq!(settings.realtime.channels, vec!["alerts".to_string()]);
        assert_eq!(settings.api.retry_attempts, 5);
        assert_eq!(settings.realtime.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn load_module_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"logging": {"moduleLevels": {"revo_realtime": "trace"}}}"#)
            .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.logging.module_levels.get("revo_realtime"), Some(&LogLevel::Trace));
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_invalid_value_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"realtime": {"backoffFactor": 0.1}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "ON"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 1000, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
        assert_eq!(parse_u64_range("700000", 1000, 600_000), None);
        assert_eq!(parse_u64_range("abc", 1000, 600_000), None);
    }

    #[test]
    fn parse_list_trims_and_skips_empty() {
        assert_eq!(parse_list(" agents, ,metrics "), vec!["agents", "metrics"]);
        assert!(parse_list("").is_empty());
    }
}

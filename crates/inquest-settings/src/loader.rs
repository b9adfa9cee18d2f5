//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`InquestSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `INQUEST_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::InquestSettings;

/// Resolve the path to the settings file (`~/.inquest/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".inquest").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<InquestSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<InquestSettings> {
    let defaults = serde_json::to_value(InquestSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: InquestSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules: numbers must be valid and within
/// the specified range, and invalid values are ignored with a warning (the
/// file/default value stays).
pub fn apply_env_overrides(settings: &mut InquestSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("INQUEST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("INQUEST_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_usize("INQUEST_MAX_SESSIONS", 1, 10_000) {
        settings.server.max_concurrent_sessions = v;
    }

    // ── Provider ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("INQUEST_DEFAULT_MODEL") {
        settings.provider.default_model = v;
    }
    if let Some(v) = read_env_string("INQUEST_BASE_URL") {
        settings.provider.base_url = Some(v);
    }
    if let Some(v) = read_env_u64("INQUEST_PROVIDER_TIMEOUT_SECS", 1, 3_600) {
        settings.provider.timeout_secs = v;
    }

    // ── Context ─────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("INQUEST_TOOL_RESULT_MAX_TOKENS", 100, 1_000_000) {
        settings.context.tool_result_max_tokens = v;
    }
    if let Some(v) = read_env_f64("INQUEST_PRESERVE_FRACTION", 0.0, 1.0) {
        settings.context.preserve_fraction = v;
    }
    if let Some(v) = read_env_u64("INQUEST_MAX_OUTPUT_TOKENS", 1, 1_000_000) {
        settings.context.max_output_tokens = Some(v);
    }

    // ── Engine ──────────────────────────────────────────────────────
    if let Some(v) = read_env_u32("INQUEST_MAX_STEPS", 1, 1_000) {
        settings.engine.max_steps = v;
    }
    if let Some(v) = read_env_usize("INQUEST_TOOL_CONCURRENCY", 1, 64) {
        settings.engine.tool_concurrency = v;
    }
    if let Some(v) = read_env_usize("INQUEST_EVENT_BACKLOG", 16, 65_536) {
        settings.engine.event_backlog = v;
    }
    if let Some(v) = read_env_string("INQUEST_WORKING_DIR") {
        settings.engine.working_directory = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("INQUEST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("INQUEST_LOG_FORMAT") {
        if let Ok(format) = serde_json::from_value(Value::String(v)) {
            settings.logging.format = format;
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as an `f64` within a range.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

fn read_env_f64(name: &str, min: f64, max: f64) -> Option<f64> {
    let val = std::env::var(name).ok()?;
    let result = parse_f64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid f64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TasklaneSettings::default()`]
//! 2. If `~/.tasklane/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TASKLANE_*` environment variable overrides (highest priority)
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{TasklaneSettings, tasklane_home};

/// Resolve the path to the settings file (`~/.tasklane/settings.json`).
pub fn settings_path() -> PathBuf {
    tasklane_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TasklaneSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TasklaneSettings> {
    load_settings_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings resolving overrides through `env` instead of the process
/// environment.
pub fn load_settings_with_env<F>(path: &Path, env: F) -> Result<TasklaneSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(TasklaneSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TasklaneSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, arrays and primitives in `source` replace `target`,
/// and `null` in `source` leaves `target` untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TASKLANE_*` overrides looked up through `env`.
///
/// Values that fail to parse or fall outside their range are ignored.
pub fn apply_env_overrides<F>(settings: &mut TasklaneSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = read_string(&env, "TASKLANE_DB_PATH") {
        settings.database.path = PathBuf::from(v);
    }
    if let Some(v) = read_u32(&env, "TASKLANE_DB_POOL_SIZE", 1, 64) {
        settings.database.pool_size = v;
    }
    if let Some(v) = read_u32(&env, "TASKLANE_DB_BUSY_TIMEOUT_MS", 0, 600_000) {
        settings.database.busy_timeout_ms = v;
    }
    if let Some(v) = read_string(&env, "TASKLANE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

fn read_string<F>(env: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(name).filter(|v| !v.is_empty())
}

fn read_u32<F>(env: &F, name: &str, min: u32, max: u32) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let val = env(name)?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid integer env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

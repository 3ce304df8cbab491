//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may contain any subset of fields.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/tasklane/tasks.db", "poolSize": 8 },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TasklaneSettings {
    /// Settings schema version.
    pub version: String,
    /// Database location and pool tuning.
    pub database: DatabaseSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TasklaneSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            database: DatabaseSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl TasklaneSettings {
    /// Reject values that cannot produce a working database or logger.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be at least 1".to_string(),
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(SettingsError::InvalidValue(
                "database.path must not be empty".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Database settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path of the `SQLite` database file.
    pub path: PathBuf,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: tasklane_home().join("tasklane.db"),
            pool_size: 4,
            busy_timeout_ms: 30_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (or full `EnvFilter` directive) for stderr output.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// The `~/.tasklane` directory.
pub fn tasklane_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tasklane")
}

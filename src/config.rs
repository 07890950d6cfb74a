//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main library configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub mirror: MirrorConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Backoff before reopening a failed connection, in milliseconds
    #[serde(default = "default_reopen_backoff_ms")]
    pub reopen_backoff_ms: u64,
}

fn default_reopen_backoff_ms() -> u64 {
    1_000
}

/// Remote mirror configuration
///
/// The mirror pushes every local mutation to the multi-device sync
/// backend on a best-effort basis. When disabled, all mirror calls
/// are no-ops and the store is purely local.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Enable best-effort mirroring
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the sync backend (e.g. "https://sync.example.com/api/v1")
    #[serde(default)]
    pub base_url: String,
    /// Opaque account identifier sent with every mirror call
    #[serde(default)]
    pub account_id: String,
    /// Opaque per-account encryption key handle
    ///
    /// Treated as a bearer credential; this library never inspects it.
    pub sync_key: Option<String>,
    /// Identifier of this device in the multi-device account
    #[serde(default)]
    pub device_id: i64,
    /// Request timeout in seconds
    #[serde(default = "default_mirror_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_mirror_timeout_seconds() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (THREADLINE_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::StoreError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("database.path", "data/threadline.db")?
            .set_default("database.reopen_backoff_ms", 1_000)?
            .set_default("mirror.enabled", false)?
            .set_default("mirror.base_url", "")?
            .set_default("mirror.account_id", "")?
            .set_default("mirror.device_id", 0)?
            .set_default("mirror.timeout_seconds", 30)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("THREADLINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::StoreError> {
        if self.mirror.enabled {
            if self.mirror.base_url.trim().is_empty() {
                return Err(crate::error::StoreError::Config(
                    "mirror.base_url is required when mirror.enabled=true".to_string(),
                ));
            }
            if self.mirror.account_id.trim().is_empty() {
                return Err(crate::error::StoreError::Config(
                    "mirror.account_id is required when mirror.enabled=true".to_string(),
                ));
            }
        }

        Ok(())
    }
}

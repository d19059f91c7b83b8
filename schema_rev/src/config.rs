//! Configuration handling for schema_rev

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::migrations::revision::DEFAULT_REVISION_TABLE;

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete schema_rev configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub driver: String,
    pub url: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Migration settings configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MigrationsConfig {
    /// Directory holding one file per migration
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_revision_table")]
    pub revision_table: String,
    /// Wrap each migrate run in a transaction
    #[serde(default)]
    pub transactional: bool,
    /// Path of the head schema document (JSON, YAML or TOML)
    pub schema: Option<String>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            revision_table: default_revision_table(),
            transactional: false,
            schema: None,
        }
    }
}

fn default_directory() -> String {
    "migrations".to_string()
}

fn default_revision_table() -> String {
    DEFAULT_REVISION_TABLE.to_string()
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_stdout")]
    pub stdout: bool,
}

fn default_format() -> String {
    "text".to_string()
}

fn default_stdout() -> bool {
    true
}

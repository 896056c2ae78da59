//! Bootstrap configuration loading
//!
//! The TOML file only carries bootstrap concerns: port, database location,
//! logging, engine defaults and the collections to create at startup.
//! Per-collection runtime configuration lives with each collection.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `CLASSIFY_CONFIG` environment variable
//! 3. Platform config file (`<config_dir>/classify/classify.toml`)
//! 4. Built-in defaults (fallback)
//!
//! A missing file is never fatal: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CLASSIFY_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// HTTP port for the event stream endpoint
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database file; absent means collections and imports are
    /// kept in memory only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Engine defaults applied to every new collection
    #[serde(default)]
    pub engine: EngineConfig,

    /// Collections created at startup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<CollectionBootstrap>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: None,
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            collections: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Engine-wide defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Buffer capacity for collections that don't set one
    #[serde(default = "default_buffer_size")]
    pub default_buffer_size: usize,

    /// Per-provider deadline for enrichment passes (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_deadline_ms: Option<u64>,

    /// Log every published event at debug level
    #[serde(default)]
    pub event_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_buffer_size: default_buffer_size(),
            provider_deadline_ms: None,
            event_log: false,
        }
    }
}

/// A collection to create when the service starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionBootstrap {
    /// Unique collection name
    pub name: String,
    /// Registered collection kind (e.g. "movies")
    pub kind: String,
    /// Collection configuration, same shape as the JSON config surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

fn default_port() -> u16 {
    3333
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_buffer_size() -> usize {
    2
}

/// Resolve which config file to read
///
/// Returns `None` when no explicit path is given and no platform config
/// file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    default_config_path().filter(|path| path.exists())
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("classify").join("classify.toml"))
}

/// Load a TOML config file
///
/// Fails with `Error::Config` when the file exists but cannot be parsed.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load configuration with graceful degradation
///
/// Missing files fall back to defaults with a warning; malformed files are
/// still reported as errors.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

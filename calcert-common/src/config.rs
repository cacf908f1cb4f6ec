//! Configuration loading and config file resolution
//!
//! Configuration is read-only bootstrap TOML. Missing or broken files never
//! stop the program: a warning is logged and compiled defaults apply.

use crate::certificate::DecimalStyle;
use crate::statistics::VolumeUnit;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CALCERT_CONFIG";

/// File name looked up under the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalcertConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults applied to new sessions and certificates
    #[serde(default)]
    pub defaults: SessionDefaults,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
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

/// Session defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// Used when a session file omits humidity
    #[serde(default = "default_humidity")]
    pub relative_humidity_percent: f64,

    #[serde(default)]
    pub unit: VolumeUnit,

    /// Decimal separator on certificates
    #[serde(default)]
    pub decimal_style: DecimalStyle,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            relative_humidity_percent: default_humidity(),
            unit: VolumeUnit::default(),
            decimal_style: DecimalStyle::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_humidity() -> f64 {
    50.0
}

/// Resolve which config file to read
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. `CALCERT_CONFIG` environment variable
/// 3. `<config dir>/calcert/config.toml`, if it exists
/// 4. None (compiled defaults)
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

    // Priority 3: Platform config directory
    default_config_path().filter(|path| path.exists())
}

/// Platform location of the user config file
///
/// Linux: `~/.config/calcert/config.toml`, macOS:
/// `~/Library/Application Support/calcert/config.toml`, Windows:
/// `%APPDATA%\calcert\config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("calcert").join(CONFIG_FILE_NAME))
}

/// Read and parse a config file, failing on any error
pub fn load_config_file(path: &Path) -> Result<CalcertConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config: CalcertConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No config file was found
    Defaults,
    /// A config file was found but could not be used
    Fallback { path: PathBuf, reason: String },
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "compiled defaults"),
            ConfigSource::Fallback { path, .. } => {
                write!(f, "compiled defaults ({} unusable)", path.display())
            }
        }
    }
}

/// Resolve and load configuration, degrading to defaults
///
/// Logs through whatever subscriber is active. Callers that load config
/// before installing their subscriber should use [`load_config_with_source`]
/// and report the source themselves.
pub fn load_config(cli_arg: Option<&Path>) -> CalcertConfig {
    let (config, source) = load_config_with_source(cli_arg);
    match &source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => info!("No config file found, using defaults"),
        ConfigSource::Fallback { reason, .. } => warn!("{}; using defaults", reason),
    }
    config
}

/// Resolve and load configuration, returning where it came from
pub fn load_config_with_source(cli_arg: Option<&Path>) -> (CalcertConfig, ConfigSource) {
    let Some(path) = resolve_config_path(cli_arg) else {
        return (CalcertConfig::default(), ConfigSource::Defaults);
    };

    match load_config_file(&path) {
        Ok(config) => (config, ConfigSource::File(path)),
        Err(e) => (
            CalcertConfig::default(),
            ConfigSource::Fallback {
                path,
                reason: e.to_string(),
            },
        ),
    }
}

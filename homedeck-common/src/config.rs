//! Bootstrap configuration loading
//!
//! Configuration priority (highest first):
//! 1. Command-line arguments / environment variables (handled by the binary)
//! 2. TOML config file (`--config`, else the platform config directory)
//! 3. Built-in defaults
//!
//! A missing default config file is not fatal: the built-in defaults are
//! used. An explicitly requested file must exist.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address to bind the HTTP server to
    #[serde(default)]
    pub bind: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Output root for acquired media; also the root of the media catalog
    #[serde(default)]
    pub media_root: Option<PathBuf>,

    /// Sandbox root for the file browser
    #[serde(default)]
    pub browse_root: Option<PathBuf>,

    /// JSON file backing the service registry
    #[serde(default)]
    pub services_file: Option<PathBuf>,

    /// EventBus capacity (events a subscriber may lag behind)
    #[serde(default)]
    pub event_capacity: Option<usize>,

    /// External acquisition tool settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Host statistics settings
    #[serde(default)]
    pub stats: StatsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External acquisition tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Executable name or path
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the target and output template
    #[serde(default)]
    pub args: Vec<String>,

    /// Kill the process after this many seconds (no limit when absent)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            timeout_secs: None,
        }
    }
}

/// Host statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Mount point whose usage is reported as `disk`
    #[serde(default = "default_disk_path")]
    pub disk_path: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            disk_path: default_disk_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
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

fn default_program() -> String {
    "spotdl".to_string()
}

fn default_disk_path() -> String {
    if cfg!(target_os = "windows") {
        "C:".to_string()
    } else {
        "/".to_string()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform default location of the config file
///
/// `~/.config/homedeck/config.toml` on Linux, the equivalent application
/// config directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("homedeck").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where the bootstrap config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No file found at this default location; built-in defaults used
    Defaults(Option<PathBuf>),
}

/// Load the bootstrap config
///
/// `explicit` is the path given on the command line, if any. It must exist.
/// Without it the platform default path is tried; when that file is absent
/// the built-in defaults are returned. Nothing is logged here because the
/// log level itself comes from this file; the caller reports the source
/// once tracing is up.
pub fn load_or_default(explicit: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigSource::File(path)))
        }
        other => Ok((TomlConfig::default(), ConfigSource::Defaults(other))),
    }
}

/// Default location of the service registry file
///
/// `~/.local/share/homedeck/services.json` on Linux, falling back to the
/// working directory when no data directory can be determined.
pub fn default_services_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("homedeck").join("services.json"))
        .unwrap_or_else(|| PathBuf::from("services.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").expect("empty TOML should parse");
        assert!(config.media_root.is_none());
        assert!(config.browse_root.is_none());
        assert_eq!(config.acquisition.program, "spotdl");
        assert!(config.acquisition.args.is_empty());
        assert!(config.acquisition.timeout_secs.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            media_root = "/srv/music"

            [acquisition]
            timeout_secs = 600
            "#,
        )
        .expect("TOML should parse");

        assert_eq!(config.media_root, Some(PathBuf::from("/srv/music")));
        assert_eq!(config.acquisition.program, "spotdl");
        assert_eq!(config.acquisition.timeout_secs, Some(600));
    }
}

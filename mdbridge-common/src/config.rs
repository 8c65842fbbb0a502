//! Configuration loading and data folder resolution
//!
//! Resolution follows a strict priority order shared by every mdbridge
//! service: environment variable, then TOML config file, then an
//! OS-dependent compiled default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
///
/// All fields are optional; unset fields fall back to environment
/// variables and compiled defaults during resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the service database
    pub data_folder: Option<String>,
    /// Folder holding credential documents (one JSON file per reference)
    pub secrets_folder: Option<String>,
    /// Bind address for the HTTP listener, e.g. "127.0.0.1:5741"
    pub bind_address: Option<String>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter ("error", "warn", "info", "debug", "trace")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Get the configuration file path for a service, following platform
/// conventions
///
/// Linux additionally checks `/etc/mdbridge/<service>.toml` when no user
/// config exists.
pub fn config_file_path(service: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", service);

    if cfg!(target_os = "linux") {
        if let Some(user_config) = dirs::config_dir().map(|d| d.join("mdbridge").join(&file_name)) {
            if user_config.exists() {
                return Some(user_config);
            }
        }
        let system_config = PathBuf::from("/etc/mdbridge").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
        None
    } else {
        dirs::config_dir()
            .map(|d| d.join("mdbridge").join(&file_name))
            .filter(|p| p.exists())
    }
}

/// Resolve the service data folder following the shared priority order:
/// 1. Environment variable (highest priority)
/// 2. TOML config file
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(env_var_name: &str, toml_config: &TomlConfig) -> PathBuf {
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(ref folder) = toml_config.data_folder {
        return PathBuf::from(folder);
    }

    default_data_folder()
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("mdbridge"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mdbridge"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mdbridge"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mdbridge"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mdbridge"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mdbridge"))
    } else {
        PathBuf::from("./mdbridge_data")
    }
}

/// Ensure a directory exists, creating it (and parents) when missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "Path exists but is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

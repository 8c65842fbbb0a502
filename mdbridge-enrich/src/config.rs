//! Service configuration resolution for mdbridge-enrich
//!
//! Settings resolve ENV → TOML → compiled default, per key. The TOML
//! file lives at the platform config path for service name `enrich`
//! (e.g. `~/.config/mdbridge/enrich.toml`).

use mdbridge_common::config::{self, TomlConfig};
use std::path::PathBuf;
use tracing::info;

/// Default HTTP bind address
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5741";

/// Resolved service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listener address
    pub bind_address: String,
    /// Folder holding the service database
    pub data_folder: PathBuf,
    /// Folder holding credential documents
    pub secrets_folder: PathBuf,
    /// Log level filter
    pub log_level: String,
}

impl ServiceConfig {
    /// Path of the service SQLite database inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join("mdbridge.db")
    }

    /// Resolve settings from the environment and the TOML config file
    pub fn resolve() -> Self {
        let toml_config = config::config_file_path("enrich")
            .and_then(|path| match config::load_toml_config(&path) {
                Ok(loaded) => {
                    info!(path = %path.display(), "Loaded TOML config");
                    Some(loaded)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable TOML config");
                    None
                }
            })
            .unwrap_or_default();

        Self::from_toml(toml_config)
    }

    fn from_toml(toml_config: TomlConfig) -> Self {
        let data_folder = config::resolve_data_folder("MDBRIDGE_DATA_FOLDER", &toml_config);

        let secrets_folder = std::env::var("MDBRIDGE_SECRETS_FOLDER")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| toml_config.secrets_folder.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| data_folder.join("secrets"));

        let bind_address = std::env::var("MDBRIDGE_BIND_ADDRESS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(toml_config.bind_address)
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let log_level = std::env::var("MDBRIDGE_LOG_LEVEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(toml_config.logging.level);

        Self {
            bind_address,
            data_folder,
            secrets_folder,
            log_level,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Application settings loaded from `config.toml` and the environment.
//!
//! Every section is optional; a missing file yields the defaults. After the
//! file is read, `DATABASE_URL` and `BIND_ADDRESS` override their settings so
//! deployments can be configured from `.env` alone.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener
    pub server: ServerSettings,
    /// Storage
    pub database: DatabaseSettings,
    /// Ledger behaviour
    pub ledger: LedgerSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// `SeaORM` connection URL
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://split_buddy.sqlite?mode=rwc".to_string(),
        }
    }
}

/// `[ledger]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerSettings {
    /// Name shown for the owning user in balances and group reports
    pub owner_display_name: String,
    /// Page size of settlement history when the caller gives none
    pub history_page_size: u64,
    /// Upper bound on the settlement history page size
    pub max_history_page_size: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            owner_display_name: "You".to_string(),
            history_page_size: 50,
            max_history_page_size: 200,
        }
    }
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse settings: {e}"),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            debug!("DATABASE_URL overrides the configured database url");
            self.database.url = url;
        }
        if let Ok(bind) = std::env::var("BIND_ADDRESS") {
            debug!("BIND_ADDRESS overrides the configured listener");
            self.server.bind = bind;
        }
    }
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Loading settings from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read settings file {path_ref:?}: {e}"),
    })?;
    Settings::from_toml(&contents)
}

/// Loads settings from `CONFIG_PATH` (or `config.toml`), falling back to the
/// defaults when the file does not exist, then applies environment overrides.
pub fn load_app_settings() -> Result<Settings> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut settings = if Path::new(&path).exists() {
        load_settings(&path)?
    } else {
        info!("No settings file at {}, using defaults", path);
        Settings::default()
    };
    settings.apply_env_overrides();
    Ok(settings)
}

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::error_handling::types::ConfigError;

/// Runtime configuration, loaded from a TOML file.
///
/// Every field has a default so a partial (or absent) configuration file is
/// usable out of the box. The token secret default is only suitable for local
/// development.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite database file. Created on first start.
    pub database_path: PathBuf,
    /// Path of the integral risk rating workbook (.xlsx).
    pub integral_report: PathBuf,
    /// Path of the detailed risk calculation workbook (.xlsx).
    pub detailed_report: PathBuf,
    /// IP address the HTTP server binds to.
    pub bind_address: String,
    /// TCP port of the HTTP server.
    pub port: u16,
    /// Single origin allowed by CORS (the front-end).
    pub cors_origin: String,
    /// HMAC secret for bearer token signing.
    pub token_secret: String,
    /// Bearer token lifetime in minutes.
    pub token_ttl_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("risks.db"),
            integral_report: PathBuf::from("reports/integral_risk_rating.xlsx"),
            detailed_report: PathBuf::from("reports/detailed_risk_calculation.xlsx"),
            bind_address: String::from("127.0.0.1"),
            port: 8000,
            cors_origin: String::from("http://localhost:3000"),
            token_secret: String::from("change-me-local-dev-secret"),
            token_ttl_minutes: 30,
        }
    }
}

impl Config {
    /// Parses the configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Loads the configuration file if it exists, otherwise falls back to the
    /// built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            let config = Config::from_file(path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        } else {
            info!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
    }

    /// Socket address the web server listens on.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::BadBindAddress(self.bind_address.clone()))
    }
}

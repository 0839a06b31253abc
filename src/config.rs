//! Configuration module for sitewatch.
//!
//! Loads configuration from environment variables (and a `.env` file, when
//! present) with sensible defaults, and the monitored sites from JSON.

use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::db::Site;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read sites file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid sites file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid site list: {0}")]
    Invalid(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 3000)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "sitewatch.db")
    pub db_path: String,
    /// Path to the JSON list of monitored sites (default: "websites.json")
    pub sites_path: String,
    /// Time between probe cycles (default: 5 minutes)
    pub probe_interval: Duration,
    /// Timeout for a single probe (default: 5 seconds)
    pub probe_timeout: Duration,
    /// Window used when a request does not ask for one (default: 60 days)
    pub default_window_days: u32,
    /// Largest window a request may ask for (default: 90 days)
    pub max_window_days: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            db_path: "sitewatch.db".to_string(),
            sites_path: "websites.json".to_string(),
            probe_interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
            default_window_days: 60,
            max_window_days: 90,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEWATCH_HTTP_PORT`: HTTP port (default: 3000)
    /// - `SITEWATCH_DB_PATH`: Database file path (default: "sitewatch.db")
    /// - `SITEWATCH_SITES_PATH`: Sites file path (default: "websites.json")
    /// - `SITEWATCH_PROBE_INTERVAL_SECS`: Probe cadence (default: 300)
    /// - `SITEWATCH_PROBE_TIMEOUT_SECS`: Probe timeout (default: 5)
    /// - `SITEWATCH_DEFAULT_WINDOW_DAYS`: Default window (default: 60)
    /// - `SITEWATCH_MAX_WINDOW_DAYS`: Maximum window (default: 90)
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Failed to load .env file: {}", e),
        }

        let mut cfg = Self::default();

        if let Some(port) = parse_var("SITEWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Ok(db_path) = env::var("SITEWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(sites_path) = env::var("SITEWATCH_SITES_PATH") {
            cfg.sites_path = sites_path;
        }

        if let Some(secs) = parse_var::<u64>("SITEWATCH_PROBE_INTERVAL_SECS").filter(|s| *s > 0) {
            cfg.probe_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>("SITEWATCH_PROBE_TIMEOUT_SECS").filter(|s| *s > 0) {
            cfg.probe_timeout = Duration::from_secs(secs);
        }

        if let Some(days) = parse_var::<u32>("SITEWATCH_MAX_WINDOW_DAYS").filter(|d| *d > 0) {
            cfg.max_window_days = days;
        }

        if let Some(days) = parse_var::<u32>("SITEWATCH_DEFAULT_WINDOW_DAYS").filter(|d| *d > 0) {
            cfg.default_window_days = days;
        }
        cfg.default_window_days = cfg.default_window_days.min(cfg.max_window_days);

        cfg
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

/// Load the monitored sites from a JSON file.
pub fn load_sites<P: AsRef<Path>>(path: P) -> Result<Vec<Site>, ConfigError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_sites(&data)
}

/// Parse and validate a JSON site list.
pub fn parse_sites(data: &str) -> Result<Vec<Site>, ConfigError> {
    let sites: Vec<Site> = serde_json::from_str(data)?;

    if sites.is_empty() {
        return Err(ConfigError::Invalid("no sites configured".to_string()));
    }

    let mut seen = HashSet::new();
    for site in &sites {
        if site.short_name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "site {:?} has an empty shortName",
                site.domain
            )));
        }
        if site.domain.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "site {} has an empty domain",
                site.short_name
            )));
        }
        if !seen.insert(site.short_name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate shortName: {}",
                site.short_name
            )));
        }
    }

    Ok(sites)
}

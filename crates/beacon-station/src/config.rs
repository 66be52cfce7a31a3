//! # Station Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BEACON_LIGHT_URL=http://panel.local/api                            │
//! │     BEACON_STATION_NAME=station-3                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/beacon-station/station.toml (Linux)                      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./beacon.db"
//! max_connections = 5
//!
//! [light_panel]
//! base_url = "http://127.0.0.1:3000/api"
//! events_url = "ws://127.0.0.1:3000/events"
//! color = 64
//!
//! [fleet]
//! base_url = "http://127.0.0.1:4000/api"
//! station_name = "station-1"
//!
//! [api]
//! bind_addr = "0.0.0.0"
//! port = 8080
//! ```

use std::path::PathBuf;
use std::time::Duration;

use beacon_core::DEFAULT_LIGHT_COLOR;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./beacon.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Light Panel Settings
// =============================================================================

/// Where lights are switched on and where confirmations come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightPanelSettings {
    /// HTTP base of the panel API; commands go to `{base_url}/Light/PostInfo`.
    #[serde(default = "default_light_url")]
    pub base_url: String,

    /// WebSocket endpoint pushing `lightCommand` events. Unset disables the listener.
    #[serde(default)]
    pub events_url: Option<String>,

    #[serde(default = "default_color")]
    pub color: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Initial reconnect backoff for the event stream (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_light_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_color() -> u32 {
    DEFAULT_LIGHT_COLOR
}

fn default_timeout() -> u64 {
    10
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for LightPanelSettings {
    fn default() -> Self {
        LightPanelSettings {
            base_url: default_light_url(),
            events_url: None,
            color: default_color(),
            timeout_secs: default_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl LightPanelSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Fleet Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSettings {
    /// HTTP base of the fleet API; dispatches go to `{base_url}/fleet`.
    #[serde(default = "default_fleet_url")]
    pub base_url: String,

    /// Station name reported to the fleet when a request names none.
    #[serde(default = "default_station_name")]
    pub station_name: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_fleet_url() -> String {
    "http://127.0.0.1:4000/api".to_string()
}

fn default_station_name() -> String {
    "station-1".to_string()
}

impl Default for FleetSettings {
    fn default() -> Self {
        FleetSettings {
            base_url: default_fleet_url(),
            station_name: default_station_name(),
            timeout_secs: default_timeout(),
        }
    }
}

impl FleetSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// API Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ApiSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Station Configuration
// =============================================================================

/// Complete configuration for a station process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub light_panel: LightPanelSettings,

    #[serde(default)]
    pub fleet: FleetSettings,

    #[serde(default)]
    pub api: ApiSettings,
}

impl StationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (station.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StationResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading station config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load station config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> StationResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StationError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StationError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| StationError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Station config saved");
        Ok(())
    }

    pub fn validate(&self) -> StationResult<()> {
        check_http_url("light_panel.base_url", &self.light_panel.base_url)?;
        check_http_url("fleet.base_url", &self.fleet.base_url)?;

        if let Some(ref url) = self.light_panel.events_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(StationError::InvalidUrl(format!(
                    "light_panel.events_url must start with ws:// or wss://, got: {}",
                    url
                )));
            }
        }

        if self.fleet.station_name.trim().is_empty() {
            return Err(StationError::InvalidConfig("fleet.station_name must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(StationError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BEACON_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("BEACON_LIGHT_URL") {
            debug!(url = %url, "Overriding light panel URL from environment");
            self.light_panel.base_url = url;
        }

        if let Ok(url) = std::env::var("BEACON_LIGHT_EVENTS_URL") {
            self.light_panel.events_url = Some(url);
        }

        if let Ok(url) = std::env::var("BEACON_FLEET_URL") {
            debug!(url = %url, "Overriding fleet URL from environment");
            self.fleet.base_url = url;
        }

        if let Ok(name) = std::env::var("BEACON_STATION_NAME") {
            self.fleet.station_name = name;
        }

        if let Ok(port) = std::env::var("BEACON_API_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.api.port = p,
                Err(_) => warn!(port = %port, "Ignoring unparseable BEACON_API_PORT"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "beacon", "station")
            .map(|dirs| dirs.config_dir().join("station.toml"))
    }
}

fn check_http_url(field: &str, url: &str) -> StationResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(StationError::InvalidUrl(format!(
            "{} must start with http:// or https://, got: {}",
            field, url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.light_panel.color, 64);
        assert_eq!(config.api.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_config_validation() {
        let mut config = StationConfig::default();

        config.light_panel.base_url = "panel.local".into();
        assert!(matches!(config.validate(), Err(StationError::InvalidUrl(_))));
        config.light_panel.base_url = "https://panel.local/api".into();

        config.light_panel.events_url = Some("http://panel.local/events".into());
        assert!(config.validate().is_err());
        config.light_panel.events_url = Some("wss://panel.local/events".into());
        assert!(config.validate().is_ok());

        config.database.max_connections = 0;
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: StationConfig = toml::from_str(
            r#"
            [fleet]
            station_name = "station-9"

            [light_panel]
            color = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.fleet.station_name, "station-9");
        assert_eq!(config.light_panel.color, 12);
        assert_eq!(config.light_panel.timeout_secs, 10);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("beacon-station-{}.toml", uuid::Uuid::new_v4()));
        let mut config = StationConfig::default();
        config.fleet.station_name = "station-7".into();
        config.save(Some(path.clone())).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[light_panel]"));
        let loaded: StationConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.fleet.station_name, "station-7");

        let _ = std::fs::remove_file(path);
    }
}

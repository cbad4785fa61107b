//! Configuration for FordPass tools.
//!
//! TOML file + environment loading, credential resolution, and
//! translation to `fordlink_api::ConnectionConfig` and
//! `fordlink_core::EngineSettings`. The engine itself never reads
//! config files; host processes load here and hand the results down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fordlink_api::ConnectionConfig;
use fordlink_core::EngineSettings;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
///
/// Credentials may come from the file or from `FORDLINK_USERNAME` /
/// `FORDLINK_PASSWORD`; the env always wins.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// FordPass account username (email).
    pub username: Option<String>,

    /// FordPass account password (plaintext — prefer the env var).
    pub password: Option<String>,

    /// Per-account application id, required for vehicle API calls.
    pub application_id: Option<String>,

    /// Engine tuning.
    #[serde(default)]
    pub options: Options,
}

/// Optional tuning knobs.
#[derive(Debug, Deserialize, Serialize)]
pub struct Options {
    /// Enable per-vehicle auto-refresh timers.
    #[serde(default)]
    pub auto_refresh: bool,

    /// Minutes between auto-refresh cycles.
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u64,

    /// Display name for the charge-level sensor.
    #[serde(default = "default_battery_name")]
    pub battery_name: String,

    /// Expose a charging-indicator switch.
    #[serde(default)]
    pub charging_switch: bool,

    /// Expose a plug-indicator switch.
    #[serde(default)]
    pub plug_switch: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            refresh_rate: default_refresh_rate(),
            battery_name: default_battery_name(),
            charging_switch: false,
            plug_switch: false,
        }
    }
}

fn default_refresh_rate() -> u64 {
    180
}
fn default_battery_name() -> String {
    "Fuel Level".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fordlink", "fordlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fordlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from an explicit file + environment.
///
/// Nested keys use a double-underscore env separator, e.g.
/// `FORDLINK_OPTIONS__REFRESH_RATE=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FORDLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Translation to api/core types ───────────────────────────────────

impl Config {
    /// Resolve account credentials, failing on anything unset.
    pub fn credentials(&self) -> Result<(String, SecretString), ConfigError> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| missing("username"))?;
        let password = self
            .password
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| missing("password"))?;
        Ok((username, password))
    }

    /// Build the API connection config. `application_id` is required;
    /// commands are rejected upstream without one.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        let (username, password) = self.credentials()?;
        let application_id = self
            .application_id
            .clone()
            .ok_or_else(|| missing("application_id"))?;
        Ok(ConnectionConfig::new(username, password, application_id))
    }

    /// Translate the tuning options into engine settings.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            auto_refresh: self.options.auto_refresh,
            refresh_rate: Duration::from_secs(self.options.refresh_rate * 60),
            ..EngineSettings::default()
        }
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.into(),
    }
}

//! TOML configuration for the SmartFloors monitor.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! runnable five-floor building. A few environment variables override the
//! file for quick container tweaks.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detect::Thresholds;
use crate::forecast::HORIZON_RANGE;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SMARTFLOORS_CONFIG";
/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "smartfloors.toml";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("building must have at least one floor")]
    NoFloors,
    #[error("simulation interval must be at least one second")]
    ZeroInterval,
    #[error("history capacity must be at least one reading")]
    ZeroHistory,
    #[error("forecast horizon must be between 10 and 180 minutes, got {0}")]
    HorizonOutOfRange(u32),
    #[error("invalid retention schedule '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("invalid bind address '{0}'")]
    InvalidBind(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidOverride { key: String, value: String },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub building: BuildingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Resolve the effective configuration:
    /// 1. `explicit` path (from `--config`); a failure here is an error.
    /// 2. The path in `SMARTFLOORS_CONFIG`; a failure here is an error too.
    /// 3. `./smartfloors.toml`.
    /// 4. Compiled-in defaults.
    ///
    /// Environment overrides are applied last and the result is validated.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default()?,
        };
        config
            .apply_overrides(|key| std::env::var(key).ok())
            .context("invalid environment override")?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Steps 2 to 4 of [`Config::resolve`].
    pub fn load_or_default() -> Result<Self> {
        Self::discover(std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    fn discover(env_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = env_path {
            return Self::load(&path).with_context(|| {
                format!("{} names a config file that could not be loaded", CONFIG_ENV)
            });
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `SMARTFLOORS_FLOORS`, `SMARTFLOORS_INTERVAL_SECS` and
    /// `SMARTFLOORS_BUILDING_NAME` through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(floors) = lookup("SMARTFLOORS_FLOORS") {
            self.building.floors = parse_override("SMARTFLOORS_FLOORS", &floors)?;
        }
        if let Some(secs) = lookup("SMARTFLOORS_INTERVAL_SECS") {
            self.simulation.interval_secs = parse_override("SMARTFLOORS_INTERVAL_SECS", &secs)?;
        }
        if let Some(name) = lookup("SMARTFLOORS_BUILDING_NAME") {
            self.building.name = name;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.building.floors == 0 {
            return Err(ConfigError::NoFloors);
        }
        if self.simulation.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.simulation.history_cap == 0 {
            return Err(ConfigError::ZeroHistory);
        }
        if !HORIZON_RANGE.contains(&self.simulation.horizon_minutes) {
            return Err(ConfigError::HorizonOutOfRange(
                self.simulation.horizon_minutes,
            ));
        }
        self.retention.schedule()?;
        self.api.socket_addr()?;
        Ok(())
    }

    /// Pretty TOML rendering for `smartfloors config`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    pub name: String,
    /// Floors are numbered 1..=floors.
    pub floors: u32,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            name: "Main Building".to_string(),
            floors: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between ticks.
    pub interval_secs: u64,
    /// Fixed RNG seed for reproducible runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Forecast horizon in minutes.
    pub horizon_minutes: u32,
    /// Readings retained per floor.
    pub history_cap: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            seed: None,
            horizon_minutes: 60,
            history_cap: crate::telemetry::DEFAULT_HISTORY_CAP,
        }
    }
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub alert_max_age_hours: u32,
    /// Six-field cron expression (seconds first). Default: top of every hour.
    pub sweep_cron: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            alert_max_age_hours: 24,
            sweep_cron: "0 0 * * * *".to_string(),
        }
    }
}

impl RetentionConfig {
    pub fn schedule(&self) -> Result<cron::Schedule, ConfigError> {
        cron::Schedule::from_str(&self.sweep_cron).map_err(|e| ConfigError::InvalidCron {
            expr: self.sweep_cron.clone(),
            reason: e.to_string(),
        })
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.alert_max_age_hours))
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Sliding one-minute send budget.
    pub max_per_minute: u32,
    /// Minimum gap between sends for the same floor and severity.
    pub cooldown_minutes: u64,
    /// POST target; when unset, notifications only go to the log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub recipients: Recipients,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_per_minute: 5,
            cooldown_minutes: 15,
            webhook_url: None,
            recipients: Recipients::default(),
        }
    }
}

/// Recipient lists per severity. `admin` is copied on critical and warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipients {
    pub critical: Vec<String>,
    pub warning: Vec<String>,
    pub info: Vec<String>,
    pub admin: Vec<String>,
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

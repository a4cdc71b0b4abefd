// Configuration management with layered configuration (file, env)

use crate::cp::SolveOptions;
use crate::models::Timestamp;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerConfig,
    pub solver: SolverConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Length of one solver time unit
    pub unit_length_seconds: u64,
    /// Window length used when a run does not set one
    pub horizon_hours: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            unit_length_seconds: 3600,
            horizon_hours: 168,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub time_limit_seconds: Option<u64>,
    pub log_search: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: Some(30),
            log_search: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub pool_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_dir: PathBuf::from("pools"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// IANA zone used when printing reports
    pub display_timezone: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            display_timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub pool_id: i64,
    /// RFC 3339; start of the current day when absent
    pub window_start: Option<String>,
    pub window_hours: Option<u64>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.unit_length_seconds == 0 {
            return Err("Scheduler unit_length_seconds must be greater than 0".to_string());
        }
        if self.scheduler.horizon_hours == 0 {
            return Err("Scheduler horizon_hours must be greater than 0".to_string());
        }
        if self.run.window_hours == Some(0) {
            return Err("Run window_hours must be greater than 0".to_string());
        }
        if self.unit_length().is_zero() || self.window_length().is_zero() {
            return Err("Scheduler lengths exceed the supported time range".to_string());
        }

        if self.storage.pool_dir.as_os_str().is_empty() {
            return Err("Storage pool_dir cannot be empty".to_string());
        }

        self.display_tz()?;
        self.window_start()?;

        Ok(())
    }

    /// Zero when the configured value is out of range; `validate` rejects both
    pub fn unit_length(&self) -> Duration {
        i64::try_from(self.scheduler.unit_length_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(Duration::zero)
    }

    pub fn window_length(&self) -> Duration {
        let hours = self.run.window_hours.unwrap_or(self.scheduler.horizon_hours);
        i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or_else(Duration::zero)
    }

    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            time_limit: self
                .solver
                .time_limit_seconds
                .map(std::time::Duration::from_secs),
            cancel: None,
            log_search: self.solver.log_search,
        }
    }

    pub fn display_tz(&self) -> Result<Tz, String> {
        self.observability
            .display_timezone
            .parse::<Tz>()
            .map_err(|e| format!("Invalid display_timezone: {}", e))
    }

    pub fn window_start(&self) -> Result<Option<Timestamp>, String> {
        self.run
            .window_start
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| format!("Invalid run window_start '{}': {}", raw, e))
            })
            .transpose()
    }
}

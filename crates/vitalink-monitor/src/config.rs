//! Daemon configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vitalink_core::{MonitorConfig, ThresholdTable};
use vitalink_types::{Threshold, VitalKind};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device settings.
    pub device: DeviceConfig,
    /// Monitoring loop settings.
    pub monitor: MonitorSettings,
    /// Alert history settings.
    pub history: HistoryConfig,
    /// Alerting settings.
    pub alerts: AlertConfig,
    /// Threshold overrides, keyed by parameter name (e.g. `heart_rate`).
    #[serde(default)]
    pub thresholds: HashMap<String, ThresholdRange>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Polling interval and backoff are within reasonable bounds
    /// - Staleness factor is greater than 1
    /// - History path is not empty and capacity is sane
    /// - Threshold parameter names are known and bounds are ordered
    ///
    /// # Example
    ///
    /// ```
    /// use vitalink_monitor::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.monitor.validate());
        errors.extend(self.history.validate());

        for (name, range) in &self.thresholds {
            let prefix = format!("thresholds.{}", name);
            if name.parse::<VitalKind>().is_err() {
                errors.push(ValidationError {
                    field: prefix.clone(),
                    message: format!("unknown parameter '{}'", name),
                });
            }
            if range.min > range.max {
                errors.push(ValidationError {
                    field: prefix,
                    message: format!(
                        "min {} is greater than max {}",
                        range.min, range.max
                    ),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// The monitoring-loop settings as the core consumes them.
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            base_interval: Duration::from_secs(self.monitor.base_interval),
            error_backoff: Duration::from_secs(self.monitor.error_backoff),
            transport_timeout: Duration::from_secs(self.monitor.transport_timeout),
            staleness_factor: self.monitor.staleness_factor,
        }
    }

    /// Build the threshold table: clinical defaults overridden by any
    /// configured ranges. Entries that fail validation are skipped, so
    /// call [`Config::validate`] first.
    #[must_use]
    pub fn threshold_table(&self) -> ThresholdTable {
        let mut table = ThresholdTable::default();
        for (name, range) in &self.thresholds {
            let Ok(kind) = name.parse::<VitalKind>() else {
                continue;
            };
            if let Ok(threshold) = Threshold::new(kind, range.min, range.max) {
                table.insert(threshold);
            }
        }
        table
    }
}

/// Device settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device address (MAC address or peripheral UUID).
    pub address: Option<String>,
}

/// Minimum base polling interval in seconds.
pub const MIN_POLL_INTERVAL: u64 = 5;
/// Maximum base polling interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;

/// Monitoring loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Base polling interval in seconds.
    pub base_interval: u64,
    /// Backoff after a failed iteration, in seconds.
    pub error_backoff: u64,
    /// Per-call transport timeout in seconds.
    pub transport_timeout: u64,
    /// Readings older than this multiple of the base interval mark the
    /// device as not worn.
    pub staleness_factor: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            base_interval: 30,
            error_backoff: 60,
            transport_timeout: 10,
            staleness_factor: 1.5,
        }
    }
}

impl MonitorSettings {
    /// Validate monitoring settings.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.base_interval < MIN_POLL_INTERVAL {
            errors.push(ValidationError {
                field: "monitor.base_interval".to_string(),
                message: format!(
                    "interval {} is too short (minimum {} seconds)",
                    self.base_interval, MIN_POLL_INTERVAL
                ),
            });
        } else if self.base_interval > MAX_POLL_INTERVAL {
            errors.push(ValidationError {
                field: "monitor.base_interval".to_string(),
                message: format!(
                    "interval {} is too long (maximum {} seconds / 1 hour)",
                    self.base_interval, MAX_POLL_INTERVAL
                ),
            });
        }

        if self.error_backoff == 0 {
            errors.push(ValidationError {
                field: "monitor.error_backoff".to_string(),
                message: "error backoff cannot be 0".to_string(),
            });
        }

        if self.transport_timeout == 0 {
            errors.push(ValidationError {
                field: "monitor.transport_timeout".to_string(),
                message: "transport timeout cannot be 0".to_string(),
            });
        }

        if self.staleness_factor <= 1.0 {
            errors.push(ValidationError {
                field: "monitor.staleness_factor".to_string(),
                message: format!(
                    "staleness factor {} must be greater than 1",
                    self.staleness_factor
                ),
            });
        }

        errors
    }
}

/// Alert history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// History file path.
    pub path: PathBuf,
    /// Maximum number of retained alerts.
    pub capacity: usize,
    /// Remove alerts older than this many days at startup (0 disables).
    pub prune_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            capacity: 50,
            prune_days: 0,
        }
    }
}

impl HistoryConfig {
    /// Validate history settings.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "history.path".to_string(),
                message: "history path cannot be empty".to_string(),
            });
        }

        if self.capacity == 0 {
            errors.push(ValidationError {
                field: "history.capacity".to_string(),
                message: "capacity cannot be 0".to_string(),
            });
        } else if self.capacity > 10_000 {
            errors.push(ValidationError {
                field: "history.capacity".to_string(),
                message: format!("capacity {} is too large (maximum 10000)", self.capacity),
            });
        }

        errors
    }
}

/// Alerting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Whether alerting is enabled at all.
    pub enabled: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A configured threshold range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdRange {
    /// Lower acceptable bound (inclusive).
    pub min: f64,
    /// Upper acceptable bound (inclusive).
    pub max: f64,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `monitor.base_interval` or `thresholds.heart_rate`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitalink")
        .join("monitor.toml")
}

/// Default alert history file path.
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitalink")
        .join("alerts.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.monitor.base_interval, 30);
        assert!(config.thresholds.is_empty());
        assert!(config.device.address.is_none());
    }

    #[test]
    fn test_monitor_settings_bounds() {
        let mut settings = MonitorSettings::default();
        settings.base_interval = 2;
        assert_eq!(settings.validate().len(), 1);

        settings.base_interval = 4000;
        assert_eq!(settings.validate().len(), 1);

        settings.base_interval = 30;
        settings.staleness_factor = 1.0;
        let errors = settings.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "monitor.staleness_factor");
    }

    #[test]
    fn test_threshold_validation() {
        let mut config = Config::default();
        config
            .thresholds
            .insert("pulse".to_string(), ThresholdRange { min: 0.0, max: 1.0 });
        config.thresholds.insert(
            "heart_rate".to_string(),
            ThresholdRange {
                min: 100.0,
                max: 60.0,
            },
        );

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_threshold_table_overrides_defaults() {
        let mut config = Config::default();
        config.thresholds.insert(
            "heart_rate".to_string(),
            ThresholdRange {
                min: 50.0,
                max: 160.0,
            },
        );

        use vitalink_core::ThresholdProvider;
        let table = config.threshold_table();
        let hr = table.get(VitalKind::HeartRate).unwrap();
        assert_eq!((hr.min, hr.max), (50.0, 160.0));
        // Untouched defaults remain
        assert!(table.get(VitalKind::SpO2).is_some());
    }

    #[test]
    fn test_config_parse_toml() {
        let toml = r#"
            [device]
            address = "AA:BB:CC:DD:EE:FF"

            [monitor]
            base_interval = 15

            [thresholds]
            heart_rate = { min = 55, max = 120 }
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(config.monitor.base_interval, 15);
        // Unspecified fields keep their defaults
        assert_eq!(config.monitor.error_backoff, 60);
        assert_eq!(config.thresholds["heart_rate"].min, 55.0);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("monitor.toml");

        let mut config = Config::default();
        config.device.address = Some("AA:BB".to_string());
        config.monitor.base_interval = 20;
        config.save(&config_path).unwrap();

        let loaded = Config::load_validated(&config_path).unwrap();
        assert_eq!(loaded.device.address.as_deref(), Some("AA:BB"));
        assert_eq!(loaded.monitor.base_interval, 20);
    }
}

//! Configuration -- `logwatch.toml` parsing and runtime settings.
//!
//! [`LogwatchConfig`] is the top-level structure. It is loaded once at
//! startup and never mutated afterwards; components receive the sections
//! they need through [`LogwatchConfig::alerts`], [`LogwatchConfig::listeners`]
//! and [`LogwatchConfig::server`].
//!
//! # Precedence
//! 1. CLI arguments (applied by the daemon)
//! 2. Environment variables (`LOGWATCH_SERVER_EXPORTER=json`)
//! 3. Config file (`logwatch.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), logwatch_core::error::LogwatchError> {
//! use logwatch_core::config::LogwatchConfig;
//!
//! let config = LogwatchConfig::load("logwatch.toml").await?;
//! let config = LogwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwatchError};
use crate::types::{AlertConfig, ListenerConfigEntry, ListenerKind, LogFormat};

/// Accepted `general.log_level` values. `off` silences diagnostics.
pub const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Accepted `general.log_format` values.
pub const VALID_LOG_FORMATS: [&str; 3] = ["json", "pretty", "compact"];

/// Exporters this build ships.
pub const KNOWN_EXPORTERS: [&str; 2] = ["console", "json"];

/// Top-level logwatch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// `[[alerts]]` entries
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
    /// `[[listeners]]` entries
    #[serde(default)]
    pub listeners: Vec<ListenerConfigEntry>,
}

impl LogwatchConfig {
    /// Loads a TOML file, applies environment overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file without environment overrides or validation.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, LogwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides scalar fields from `LOGWATCH_{SECTION}_{FIELD}` variables.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWATCH_GENERAL_LOG_FORMAT");

        override_string(&mut self.server.exporter, "LOGWATCH_SERVER_EXPORTER");
        override_u64(
            &mut self.server.metric_interval_ms,
            "LOGWATCH_SERVER_METRIC_INTERVAL_MS",
        );
        override_usize(
            &mut self.server.channel_capacity,
            "LOGWATCH_SERVER_CHANNEL_CAPACITY",
        );
        override_u64(
            &mut self.server.tail_poll_interval_ms,
            "LOGWATCH_SERVER_TAIL_POLL_INTERVAL_MS",
        );

        override_bool(&mut self.metrics.enabled, "LOGWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGWATCH_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGWATCH_METRICS_ENDPOINT");
    }

    /// Validates every section.
    ///
    /// Alerts referring to a metric no listener produces are accepted with a
    /// warning: they simply never fire.
    pub fn validate(&self) -> Result<(), LogwatchError> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", VALID_LOG_FORMATS.join(", ")),
            ));
        }

        if !KNOWN_EXPORTERS.contains(&self.server.exporter.as_str()) {
            return Err(ConfigError::UnknownReference {
                kind: "exporter".to_owned(),
                name: self.server.exporter.clone(),
            }
            .into());
        }

        if self.server.metric_interval_ms == 0 {
            return Err(invalid(
                "server.metric_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.server.channel_capacity == 0 {
            return Err(invalid(
                "server.channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        let mut names = HashSet::new();
        for alert in &self.alerts {
            if alert.name.is_empty() {
                return Err(invalid("alerts.name", "must not be empty".to_owned()));
            }
            if !names.insert(alert.name.as_str()) {
                return Err(invalid(
                    "alerts.name",
                    format!("duplicate alert name '{}'", alert.name),
                ));
            }
            if alert.threshold.timerange == 0 {
                return Err(invalid(
                    "alerts.threshold.timerange",
                    format!("alert '{}': must be at least 1", alert.name),
                ));
            }
            if alert.cooldown.timerange == 0 {
                return Err(invalid(
                    "alerts.cooldown.timerange",
                    format!("alert '{}': must be at least 1", alert.name),
                ));
            }
            if !alert.threshold.value.is_finite() {
                return Err(invalid(
                    "alerts.threshold.value",
                    format!("alert '{}': must be a finite number", alert.name),
                ));
            }
        }

        for entry in &self.listeners {
            if entry.listener == ListenerKind::File && entry.options.path.as_os_str().is_empty() {
                return Err(invalid(
                    "listeners.options.path",
                    "must not be empty".to_owned(),
                ));
            }
        }

        let produced: HashSet<&str> = self
            .listeners
            .iter()
            .filter_map(|entry| entry.options.metric.as_ref())
            .map(|metric| metric.name.as_str())
            .collect();
        for alert in &self.alerts {
            if !produced.contains(alert.metric.as_str()) {
                warn!(
                    alert = %alert.name,
                    metric = %alert.metric,
                    "alert refers to a metric no listener produces"
                );
            }
        }

        Ok(())
    }

    /// Alert definitions, in file order.
    pub fn alerts(&self) -> &[AlertConfig] {
        &self.alerts
    }

    /// Listener entries, in file order.
    pub fn listeners(&self) -> &[ListenerConfigEntry] {
        &self.listeners
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }
}

fn invalid(field: &str, reason: String) -> LogwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// Diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error, off
    pub log_level: String,
    /// json, pretty, compact
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "compact".to_owned(),
        }
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Exporter name (console, json)
    pub exporter: String,
    /// Interval between two metric emissions (ms)
    pub metric_interval_ms: u64,
    /// Capacity of the event bus channel
    pub channel_capacity: usize,
    /// Poll fallback for the tail listener (ms), 0 disables it
    pub tail_poll_interval_ms: u64,
    /// Format of the tailed lines
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            exporter: "console".to_owned(),
            metric_interval_ms: 1000,
            channel_capacity: 1024,
            tail_poll_interval_ms: 0,
            log_format: LogFormat::ClfHttp,
        }
    }
}

/// Prometheus scrape endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9105,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = std::any::type_name::<T>(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

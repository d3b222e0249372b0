//! Domain types shared by every logwatch crate.
//!
//! Configuration records ([`AlertConfig`], [`MetricConfig`],
//! [`ListenerConfigEntry`]) are deserialized once at startup and never
//! mutated afterwards. [`HttpLog`] is the structured record produced by the
//! Common Log Format parser.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// --- Alerts ---

/// Comparison operator of an alert threshold.
///
/// Serialized with its symbol (`">"`, `"<"`, `"="`, `"!="`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertOperator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl AlertOperator {
    /// Returns `true` when `average` crosses `threshold` for this operator.
    pub fn crossed(self, average: f64, threshold: f64) -> bool {
        match self {
            Self::Greater => average > threshold,
            Self::Less => average < threshold,
            Self::Equal => average == threshold,
            Self::NotEqual => average != threshold,
        }
    }

    /// The operator whose predicate must hold before an active alert recovers.
    ///
    /// `>` maps to `<` (not `<=`), so a value sitting exactly on the
    /// threshold neither triggers nor recovers.
    pub fn opposite(self) -> Self {
        match self {
            Self::Greater => Self::Less,
            Self::Less => Self::Greater,
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
        }
    }

    /// Symbol used in configuration files and exporter output.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::Less => "<",
            Self::Equal => "=",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for AlertOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Threshold part of an alert definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Value the window average is compared against.
    pub value: f64,
    /// Comparison operator.
    pub operator: AlertOperator,
    /// Number of samples averaged (a sample count, not a duration).
    pub timerange: usize,
}

/// Cooldown part of an alert definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    /// Number of samples averaged before an active alert may recover.
    pub timerange: usize,
}

/// Alert definition, keyed by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Unique alert name.
    pub name: String,
    /// Name of the metric this alert watches.
    pub metric: String,
    pub threshold: Threshold,
    pub cooldown: Cooldown,
}

impl AlertConfig {
    /// Maximum number of samples the alert engine keeps for this alert.
    ///
    /// Never less than one.
    pub fn bucket_capacity(&self) -> usize {
        self.threshold.timerange.max(self.cooldown.timerange).max(1)
    }
}

// --- Metrics ---

/// Runtime kind of a derived metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Arrival rate in events per second.
    Meter,
    /// Total number of arrivals.
    Counter,
    /// Any type this build does not know how to compute.
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meter => write!(f, "meter"),
            Self::Counter => write!(f, "counter"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Metric definition attached to a listener, keyed by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// A computed metric value, as carried by metric events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// `None` when no value could be computed.
    pub value: Option<f64>,
    pub unit: String,
}

// --- Listeners ---

/// Listener implementation selected by a configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    /// Tail a file on disk.
    File,
    /// Unknown kind; logged and skipped at startup.
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Options of a file listener entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerOptions {
    /// File to tail.
    pub path: PathBuf,
    /// Emit the content already present when the listener starts.
    #[serde(default, alias = "readAllOnStart")]
    pub read_all_on_start: bool,
    /// Metric derived from every line of this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricConfig>,
}

/// One `[[listeners]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfigEntry {
    pub listener: ListenerKind,
    pub options: ListenerOptions,
}

// --- Parsed logs ---

/// Log format tag used to select a parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Common Log Format for HTTP access logs.
    #[default]
    ClfHttp,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClfHttp => write!(f, "clf_http"),
        }
    }
}

/// HTTP access log record parsed from a Common Log Format line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpLog {
    /// Remote host.
    pub host: String,
    /// RFC 1413 identity, `None` for `-`.
    pub ident: Option<String>,
    /// Authenticated user, `None` for `-`.
    pub auth_user: Option<String>,
    /// Request time with its original offset.
    pub date: DateTime<FixedOffset>,
    pub method: String,
    pub path: Option<String>,
    pub protocol: Option<String>,
    /// Response status, `None` for `-`.
    pub status: Option<u16>,
    /// Response size in bytes (`-` is read as 0).
    pub size: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl HttpLog {
    /// Status class bucket (`2` for 2xx and so on), if a status is present.
    pub fn status_class(&self) -> Option<u16> {
        self.status.map(|s| s / 100)
    }
}

impl fmt::Display for HttpLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{} {}\" {} {}",
            self.host,
            self.method,
            self.path.as_deref().unwrap_or("-"),
            self.status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_owned()),
            self.size,
        )
    }
}

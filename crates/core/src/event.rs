//! Event system -- the unit of communication between pipeline components.
//!
//! Every event carries an [`EventMetadata`] (id, timestamp, trace id,
//! result) and one of four payloads. [`Event`] is the sum type the router
//! moves around; [`EventType`] is the tag handlers are registered under.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{AlertConfig, HttpLog, MetricSample};

/// Source name used by the file tail listener.
pub const SOURCE_FILE_LISTENER: &str = "file";
/// Source name used by the metric producer.
pub const SOURCE_METRIC_PRODUCER: &str = "metric-producer";
/// Source name used by the alert engine.
pub const SOURCE_ALERT_ENGINE: &str = "alert-engine";

/// Event type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A raw line read by a listener
    RawLog,
    /// A parsed log record
    FormattedLog,
    /// A computed metric value
    Metric,
    /// An alert state transition
    Alert,
}

impl EventType {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RawLog => "raw_log",
            Self::FormattedLog => "formatted_log",
            Self::Metric => "metric",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handling an event.
///
/// Only `Ack` from every registered handler lets an event reach the exporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResult {
    #[default]
    Unknown,
    Ack,
    Recorded,
    Invalid,
}

impl fmt::Display for EventResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Ack => write!(f, "ack"),
            Self::Recorded => write!(f, "recorded"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Metadata shared by every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event id (UUID v4)
    pub id: String,
    /// Creation time
    pub timestamp: SystemTime,
    /// Links derived events (a formatted log shares its raw log's trace)
    pub trace_id: String,
    /// Result recorded by the producer
    pub result: EventResult,
}

impl EventMetadata {
    /// Metadata starting a new trace.
    pub fn new(result: EventResult) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            trace_id: id.clone(),
            id,
            timestamp: SystemTime::now(),
            result,
        }
    }

    /// Metadata for an event derived from another one.
    ///
    /// Keeps the parent's timestamp and trace id.
    pub fn derived(parent: &EventMetadata, result: EventResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: parent.timestamp,
            trace_id: parent.trace_id.clone(),
            result,
        }
    }
}

/// A raw line read from a watched file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogEvent {
    pub metadata: EventMetadata,
    /// Listener identity
    pub source: String,
    pub line: String,
    pub filepath: PathBuf,
}

impl RawLogEvent {
    pub fn new(source: impl Into<String>, line: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            metadata: EventMetadata::new(EventResult::Unknown),
            source: source.into(),
            line: line.into(),
            filepath: filepath.into(),
        }
    }
}

/// A raw line after a successful parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedLogEvent {
    pub metadata: EventMetadata,
    pub source: String,
    pub log: HttpLog,
    pub filepath: PathBuf,
}

impl FormattedLogEvent {
    /// Builds the formatted event for `raw`, sharing its trace.
    pub fn from_raw(raw: &RawLogEvent, log: HttpLog) -> Self {
        Self {
            metadata: EventMetadata::derived(&raw.metadata, EventResult::Ack),
            source: raw.source.clone(),
            log,
            filepath: raw.filepath.clone(),
        }
    }
}

/// A computed metric value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    pub metadata: EventMetadata,
    pub metric: MetricSample,
}

impl MetricEvent {
    pub fn new(metric: MetricSample) -> Self {
        Self {
            metadata: EventMetadata::new(EventResult::Unknown),
            metric,
        }
    }
}

/// An alert state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub metadata: EventMetadata,
    /// Snapshot of the alert definition
    pub alert: AlertConfig,
    /// New state
    pub active: bool,
    /// Window average that caused the transition
    pub value: f64,
}

impl AlertEvent {
    pub fn new(alert: AlertConfig, active: bool, value: f64) -> Self {
        Self {
            metadata: EventMetadata::new(EventResult::Unknown),
            alert,
            active,
            value,
        }
    }
}

/// Any event routed through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RawLog(RawLogEvent),
    FormattedLog(FormattedLogEvent),
    Metric(MetricEvent),
    Alert(AlertEvent),
}

impl Event {
    /// Tag of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RawLog(_) => EventType::RawLog,
            Self::FormattedLog(_) => EventType::FormattedLog,
            Self::Metric(_) => EventType::Metric,
            Self::Alert(_) => EventType::Alert,
        }
    }

    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::RawLog(e) => &e.metadata,
            Self::FormattedLog(e) => &e.metadata,
            Self::Metric(e) => &e.metadata,
            Self::Alert(e) => &e.metadata,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.metadata().id
    }
}

impl From<RawLogEvent> for Event {
    fn from(e: RawLogEvent) -> Self {
        Self::RawLog(e)
    }
}

impl From<FormattedLogEvent> for Event {
    fn from(e: FormattedLogEvent) -> Self {
        Self::FormattedLog(e)
    }
}

impl From<MetricEvent> for Event {
    fn from(e: MetricEvent) -> Self {
        Self::Metric(e)
    }
}

impl From<AlertEvent> for Event {
    fn from(e: AlertEvent) -> Self {
        Self::Alert(e)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.event_id();
        let short = &id[..8.min(id.len())];
        match self {
            Self::RawLog(e) => write!(f, "RawLog[{short}] path={}", e.filepath.display()),
            Self::FormattedLog(e) => {
                write!(f, "FormattedLog[{short}] path={} {}", e.filepath.display(), e.log)
            }
            Self::Metric(e) => write!(f, "Metric[{short}] name={}", e.metric.name),
            Self::Alert(e) => write!(
                f,
                "Alert[{short}] name={} active={}",
                e.alert.name, e.active
            ),
        }
    }
}

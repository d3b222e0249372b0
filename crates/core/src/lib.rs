#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// errors
pub use error::{ConfigError, LogwatchError, ParseError, PipelineError};

// config
pub use config::LogwatchConfig;

// events
pub use event::{
    AlertEvent, Event, EventMetadata, EventResult, EventType, FormattedLogEvent, MetricEvent,
    RawLogEvent,
};

// traits
pub use pipeline::{BoxFuture, EventHandler, Exporter, Handler, LogParser};

// domain types
pub use types::{
    AlertConfig, AlertOperator, HttpLog, ListenerConfigEntry, LogFormat, MetricConfig,
    MetricKind, MetricSample,
};

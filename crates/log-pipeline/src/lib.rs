#![doc = include_str!("../README.md")]
//!
//! # Modules
//!
//! - [`router`]: per-type handler registry and ACK-gated forwarding to the exporter
//! - [`bus`]: per-event-type lanes feeding the router
//! - [`listener`]: file tail listener producing raw log events
//! - [`parser`]: Common Log Format parser and the format router
//! - [`handler`]: raw log parsing into formatted log events
//! - [`metric`]: meters, counters and the periodic metric producer
//! - [`alert`]: alert engine with threshold and cooldown windows
//! - [`exporter`]: console and JSON exporters
//! - [`error`]: domain error type

pub mod alert;
pub mod bus;
pub mod error;
pub mod exporter;
pub mod handler;
pub mod listener;
pub mod metric;
pub mod parser;
pub mod router;

// --- re-exports ---

pub use alert::{AlertEngine, Transition};
pub use bus::{BusReceiver, EventBus};
pub use error::LogPipelineError;
pub use exporter::{ConsoleExporter, JsonExporter};
pub use handler::LogEventHandler;
pub use listener::{FileListener, FileListenerConfig};
pub use metric::{Counter, Meter, MetricInstance, MetricProducer};
pub use parser::{ClfHttpParser, ParserRouter};
pub use router::{EventRouter, RouteOutcome};

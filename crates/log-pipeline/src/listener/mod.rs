//! Log sources.
//!
//! A listener turns an external source into [`RawLogEvent`]s on the bus.
//! Only files are supported; each configured path is tailed independently.
//!
//! [`RawLogEvent`]: logwatch_core::event::RawLogEvent

pub mod file;

pub use file::{FileListener, FileListenerConfig};

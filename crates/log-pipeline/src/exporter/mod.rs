//! Exporters -- presentation of ACK-gated events.
//!
//! The router hands every event that all handlers acknowledged to exactly one
//! [`Exporter`]. Exporters only render; they never feed events back into the
//! pipeline.
//!
//! | Name | Type | Output |
//! |------|------|--------|
//! | `console` | [`ConsoleExporter`] | one human-readable line per event |
//! | `json` | [`JsonExporter`] | one JSON object per line |
//!
//! ```ignore
//! let exporter = exporter::from_name(&config.server.exporter)?;
//! let router = EventRouter::new(exporter);
//! ```

pub mod console;
pub mod json;

pub use console::ConsoleExporter;
pub use json::JsonExporter;

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use logwatch_core::config::KNOWN_EXPORTERS;
use logwatch_core::error::{ConfigError, PipelineError};
use logwatch_core::pipeline::Exporter;

/// Builds the exporter registered under `name`, writing to stdout.
pub fn from_name(name: &str) -> Result<Arc<dyn Exporter>, ConfigError> {
    match name {
        "console" => Ok(Arc::new(ConsoleExporter::stdout())),
        "json" => Ok(Arc::new(JsonExporter::stdout())),
        other => Err(ConfigError::UnknownReference {
            kind: "exporter".to_owned(),
            name: format!("{other} (known: {})", KNOWN_EXPORTERS.join(", ")),
        }),
    }
}

/// Writer shared by the concurrent routing tasks of one exporter.
///
/// One event is written under one lock, so lines never interleave.
pub(crate) struct SharedWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl SharedWriter {
    pub(crate) fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    pub(crate) fn write_line(&self, line: &str) -> Result<(), PipelineError> {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(w, "{line}")
            .and_then(|()| w.flush())
            .map_err(|e| PipelineError::ExportFailed(e.to_string()))
    }
}

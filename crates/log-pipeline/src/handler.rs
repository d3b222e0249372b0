//! Log formatting handler: raw lines in, formatted logs out.

use logwatch_core::error::PipelineError;
use logwatch_core::event::{Event, EventResult, EventType, FormattedLogEvent};
use logwatch_core::metrics as m;
use logwatch_core::pipeline::Handler;
use logwatch_core::types::LogFormat;
use tracing::debug;

use crate::bus::EventBus;
use crate::parser::ParserRouter;

/// Parses every raw log with the configured format.
///
/// A line that does not parse is answered with [`EventResult::Invalid`], so
/// the raw event never reaches the exporter. A parsed line is emitted as a
/// [`FormattedLogEvent`] sharing the raw event's trace.
pub struct LogEventHandler {
    parsers: ParserRouter,
    format: LogFormat,
    bus: EventBus,
}

impl LogEventHandler {
    pub fn new(parsers: ParserRouter, format: LogFormat, bus: EventBus) -> Self {
        Self {
            parsers,
            format,
            bus,
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl Handler for LogEventHandler {
    fn name(&self) -> &str {
        "log-formatter"
    }

    async fn on_event(
        &self,
        event: &Event,
        _event_type: EventType,
    ) -> Result<EventResult, PipelineError> {
        let Event::RawLog(raw) = event else {
            return Ok(EventResult::Ack);
        };

        let log = match self.parsers.parse(&raw.line, self.format) {
            Ok(Some(log)) => log,
            Ok(None) => {
                debug!(
                    path = %raw.filepath.display(),
                    format = %self.format,
                    "line does not match log format"
                );
                metrics::counter!(m::PARSER_FAILURES_TOTAL, m::LABEL_PARSER_FORMAT => self.format.to_string())
                    .increment(1);
                return Ok(EventResult::Invalid);
            }
            Err(e) => {
                debug!(path = %raw.filepath.display(), error = %e, "line rejected by parser");
                metrics::counter!(m::PARSER_FAILURES_TOTAL, m::LABEL_PARSER_FORMAT => self.format.to_string())
                    .increment(1);
                return Ok(EventResult::Invalid);
            }
        };

        self.bus.emit(FormattedLogEvent::from_raw(raw, log)).await;
        Ok(EventResult::Ack)
    }
}

//! JSON lines output.

use std::io::Write;

use logwatch_core::error::PipelineError;
use logwatch_core::event::{Event, EventResult, EventType};
use logwatch_core::pipeline::{BoxFuture, Exporter};

use super::SharedWriter;

/// Writes every event as one JSON object per line, raw logs included.
pub struct JsonExporter {
    out: SharedWriter,
}

impl JsonExporter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: SharedWriter::new(writer),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl Exporter for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    fn ingest<'a>(
        &'a self,
        event: &'a Event,
        _event_type: EventType,
    ) -> BoxFuture<'a, Result<EventResult, PipelineError>> {
        Box::pin(async move {
            let line = serde_json::to_string(event)
                .map_err(|e| PipelineError::ExportFailed(e.to_string()))?;
            self.out.write_line(&line)?;
            Ok(EventResult::Recorded)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::test_util::Capture;
    use logwatch_core::event::{MetricEvent, RawLogEvent};
    use logwatch_core::types::{MetricKind, MetricSample};

    #[tokio::test]
    async fn one_object_per_line() {
        let capture = Capture::default();
        let exporter = JsonExporter::new(capture.clone());

        let raw: Event = RawLogEvent::new("file", "hello", "/tmp/a.log").into();
        let metric: Event = MetricEvent::new(MetricSample {
            name: "log volume".to_owned(),
            kind: MetricKind::Meter,
            value: Some(1.0),
            unit: "req/s".to_owned(),
        })
        .into();

        for event in [&raw, &metric] {
            let result = exporter.ingest(event, event.event_type()).await.unwrap();
            assert_eq!(result, EventResult::Recorded);
        }

        let out = capture.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["line"], "hello");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["metric"]["name"], "log volume");
    }
}

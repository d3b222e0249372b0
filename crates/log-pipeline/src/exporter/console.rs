//! Human-readable console output.

use std::io::Write;

use colored::Colorize;
use logwatch_core::error::PipelineError;
use logwatch_core::event::{AlertEvent, Event, EventResult, EventType, MetricEvent};
use logwatch_core::pipeline::{BoxFuture, Exporter};

use super::SharedWriter;

/// Prints formatted logs, metrics and alert transitions, one line each.
///
/// Raw logs are not printed: every raw log that parses reaches the exporter
/// again as a formatted log.
pub struct ConsoleExporter {
    out: SharedWriter,
}

impl ConsoleExporter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: SharedWriter::new(writer),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Line for `event`, `None` when the event is not printed.
    pub fn render(event: &Event) -> Option<String> {
        match event {
            Event::RawLog(_) => None,
            Event::FormattedLog(e) => {
                let log = serde_json::to_string(&e.log).unwrap_or_else(|_| e.log.to_string());
                Some(format!(
                    "New formatted log from {}: {log}",
                    e.filepath.display()
                ))
            }
            Event::Metric(e) => Some(render_metric(e)),
            Event::Alert(e) => Some(render_alert(e)),
        }
    }
}

fn render_metric(event: &MetricEvent) -> String {
    let metric = &event.metric;
    match metric.value {
        Some(value) => format!(
            "Metric {} is now equal {value} {}",
            metric.name, metric.unit
        )
        .trim_end()
        .to_owned(),
        None => format!("Metric {} has no value", metric.name),
    }
}

fn render_alert(event: &AlertEvent) -> String {
    let alert = &event.alert;
    if event.active {
        format!(
            "Alert {} is now active: value ({:.1}) has been {} {} for {} samples",
            alert.name,
            event.value,
            alert.threshold.operator,
            alert.threshold.value,
            alert.threshold.timerange,
        )
        .red()
        .to_string()
    } else {
        format!(
            "Alert {} is now inactive: value ({:.1}) has been {} {} for {} samples",
            alert.name,
            event.value,
            alert.threshold.operator.opposite(),
            alert.threshold.value,
            alert.cooldown.timerange,
        )
        .green()
        .to_string()
    }
}

impl Exporter for ConsoleExporter {
    fn name(&self) -> &str {
        "console"
    }

    fn ingest<'a>(
        &'a self,
        event: &'a Event,
        _event_type: EventType,
    ) -> BoxFuture<'a, Result<EventResult, PipelineError>> {
        Box::pin(async move {
            if let Some(line) = Self::render(event) {
                self.out.write_line(&line)?;
            }
            Ok(EventResult::Recorded)
        })
    }
}

//! Orchestrator tests: config -> build -> start -> events at the exporter -> shutdown.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use logwatch_core::config::LogwatchConfig;
use logwatch_core::error::PipelineError;
use logwatch_core::event::{Event, EventResult, EventType};
use logwatch_core::pipeline::{BoxFuture, Exporter};
use logwatch_daemon::orchestrator::Orchestrator;

const LINE: &str =
    r#"10.0.0.1 - - [15/Jan/2024:08:00:01 +0000] "GET /index.html HTTP/1.1" 200 1043"#;

struct Collect(mpsc::UnboundedSender<Event>);

impl Exporter for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn ingest<'a>(
        &'a self,
        event: &'a Event,
        _event_type: EventType,
    ) -> BoxFuture<'a, Result<EventResult, PipelineError>> {
        Box::pin(async move {
            let _ = self.0.send(event.clone());
            Ok(EventResult::Recorded)
        })
    }
}

fn config_for(log: &Path) -> LogwatchConfig {
    let toml_str = format!(
        r#"
[general]
log_level = "off"

[server]
metric_interval_ms = 50
tail_poll_interval_ms = 20

[[alerts]]
name = "any traffic"
metric = "log volume"
threshold = {{ value = 0.0, operator = ">", timerange = 1 }}
cooldown = {{ timerange = 1 }}

[[listeners]]
listener = "file"
options = {{ path = '{}', read_all_on_start = true, metric = {{ name = "log volume", unit = "req/s", type = "meter" }} }}
"#,
        log.display()
    );
    LogwatchConfig::parse(&toml_str).expect("test config should parse")
}

async fn wait_for(rx: &mut mpsc::UnboundedReceiver<Event>, event_type: EventType) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("exporter closed");
            if event.event_type() == event_type {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[test]
fn build_registers_handlers_per_event_type() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();

    let orchestrator =
        Orchestrator::build_with_exporter(config_for(file.path()), Arc::new(Collect(tx))).unwrap();

    let router = orchestrator.router();
    assert_eq!(router.exporter_name(), "collect");
    assert_eq!(router.handler_count(EventType::RawLog), 2);
    assert_eq!(router.handler_count(EventType::Metric), 1);
    assert_eq!(router.handler_count(EventType::FormattedLog), 0);
    assert_eq!(router.handler_count(EventType::Alert), 0);
}

#[test]
fn build_from_config_rejects_unknown_exporter() {
    let mut config = LogwatchConfig::default();
    config.server.exporter = "dashboard".to_owned();

    let err = Orchestrator::build_from_config(config).err().unwrap();
    assert!(err.to_string().contains("dashboard"));
}

#[test]
fn build_from_config_with_defaults() {
    let orchestrator = Orchestrator::build_from_config(LogwatchConfig::default()).unwrap();
    assert_eq!(orchestrator.router().exporter_name(), "console");
    assert!(orchestrator.listener().watched_paths().is_empty());
}

#[tokio::test]
async fn file_lines_flow_to_exporter_and_raise_alert() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{LINE}").unwrap();
    file.flush().unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orchestrator =
        Orchestrator::build_with_exporter(config_for(file.path()), Arc::new(Collect(tx))).unwrap();
    orchestrator.start().await.unwrap();
    assert_eq!(
        orchestrator.listener().watched_paths(),
        vec![file.path().to_path_buf()]
    );

    match wait_for(&mut rx, EventType::FormattedLog).await {
        Event::FormattedLog(formatted) => assert_eq!(formatted.log.host, "10.0.0.1"),
        other => panic!("unexpected event {other}"),
    }

    match wait_for(&mut rx, EventType::Alert).await {
        Event::Alert(alert) => {
            assert!(alert.active);
            assert_eq!(alert.alert.name, "any traffic");
            assert!(alert.value > 0.0);
        }
        other => panic!("unexpected event {other}"),
    }
    assert!(orchestrator.alert_engine().is_active("any traffic"));

    orchestrator.shutdown().await;
    assert!(orchestrator.bus().is_closed());
}

#[tokio::test]
async fn start_skips_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();

    let mut orchestrator = Orchestrator::build_with_exporter(
        config_for(&dir.path().join("missing.log")),
        Arc::new(Collect(tx)),
    )
    .unwrap();

    orchestrator.start().await.unwrap();
    assert!(orchestrator.listener().watched_paths().is_empty());
    orchestrator.shutdown().await;
}

#[tokio::test]
async fn start_twice_fails() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut orchestrator =
        Orchestrator::build_with_exporter(LogwatchConfig::default(), Arc::new(Collect(tx)))
            .unwrap();

    orchestrator.start().await.unwrap();
    assert!(orchestrator.start().await.is_err());
    orchestrator.shutdown().await;
}

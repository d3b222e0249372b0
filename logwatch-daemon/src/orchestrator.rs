//! Pipeline assembly and lifecycle.
//!
//! The [`Orchestrator`] turns a validated [`LogwatchConfig`] into a running
//! pipeline:
//!
//! | Event type | Handlers |
//! |------------|----------|
//! | raw log | log formatter, metric producer |
//! | formatted log | none |
//! | metric | alert engine |
//! | alert | none |
//!
//! # Startup order
//!
//! 1. router dispatch loop (consumes the bus)
//! 2. metric ticker
//! 3. file listeners (produce raw logs)
//!
//! # Shutdown order
//!
//! 1. file listeners (stop producing)
//! 2. ticker and router (in-flight routes drained)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logwatch_core::config::LogwatchConfig;
use logwatch_core::event::EventType;
use logwatch_core::pipeline::Exporter;
use logwatch_core::types::ListenerKind;
use logwatch_pipeline::{
    exporter, AlertEngine, BusReceiver, EventBus, EventRouter, FileListener, FileListenerConfig,
    LogEventHandler, MetricProducer, ParserRouter,
};

use crate::metrics_server;

/// Owns every pipeline component and the tasks driving them.
pub struct Orchestrator {
    config: LogwatchConfig,
    bus: EventBus,
    /// taken by `start`
    rx: Option<BusReceiver>,
    router: Arc<EventRouter>,
    producer: Arc<MetricProducer>,
    alerts: Arc<AlertEngine>,
    listener: FileListener,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Loads `config_path` and builds the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Builds from a loaded configuration, with the exporter it names.
    ///
    /// Installs the Prometheus recorder when `[metrics] enabled`, once the
    /// pipeline has been assembled. A failed build leaves no recorder behind.
    pub fn build_from_config(config: LogwatchConfig) -> Result<Self> {
        validate(&config)?;

        let exporter = exporter::from_name(&config.server.exporter)
            .map_err(|e| anyhow::anyhow!("failed to create exporter: {}", e))?;
        let orchestrator = Self::assemble(config, exporter)?;

        if orchestrator.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&orchestrator.config.metrics)?;
        }
        Ok(orchestrator)
    }

    /// Builds with an explicit exporter, ignoring `server.exporter`.
    pub fn build_with_exporter(config: LogwatchConfig, exporter: Arc<dyn Exporter>) -> Result<Self> {
        validate(&config)?;
        Self::assemble(config, exporter)
    }

    /// Wires the pipeline for an already validated configuration.
    fn assemble(config: LogwatchConfig, exporter: Arc<dyn Exporter>) -> Result<Self> {
        let server = config.server();
        let parsers = ParserRouter::with_defaults()
            .map_err(|e| anyhow::anyhow!("failed to build parsers: {}", e))?;
        if !parsers.supports(server.log_format) {
            return Err(anyhow::anyhow!(
                "no parser registered for log format '{}'",
                server.log_format
            ));
        }

        let (bus, rx) = EventBus::channel(server.channel_capacity);

        let formatter = Arc::new(LogEventHandler::new(parsers, server.log_format, bus.clone()));
        let producer = Arc::new(MetricProducer::new(config.listeners().to_vec(), bus.clone()));
        let alerts = Arc::new(AlertEngine::new(config.alerts().to_vec(), bus.clone()));

        let mut router = EventRouter::new(exporter);
        router.register(EventType::RawLog, formatter);
        router.register(EventType::RawLog, producer.clone());
        router.register(EventType::Metric, alerts.clone());

        let cancel = CancellationToken::new();
        let poll_interval = (server.tail_poll_interval_ms > 0)
            .then(|| Duration::from_millis(server.tail_poll_interval_ms));
        let listener = FileListener::new(
            FileListenerConfig {
                poll_interval,
                ..FileListenerConfig::default()
            },
            bus.clone(),
            cancel.clone(),
        );

        tracing::info!(
            exporter = router.exporter_name(),
            alerts = config.alerts().len(),
            listeners = config.listeners().len(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            bus,
            rx: Some(rx),
            router: Arc::new(router),
            producer,
            alerts,
            listener,
            cancel,
            tasks: Vec::new(),
        })
    }

    /// Spawns the dispatch loop and the ticker, then registers every listener.
    ///
    /// A listener that cannot be watched is logged and skipped, as is an
    /// unsupported listener kind.
    pub async fn start(&mut self) -> Result<()> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("orchestrator already started"))?;

        self.tasks.push(tokio::spawn(
            Arc::clone(&self.router).run(rx, self.cancel.clone()),
        ));
        self.tasks.push(Arc::clone(&self.producer).spawn_ticker(
            Duration::from_millis(self.config.server.metric_interval_ms),
            self.cancel.clone(),
        ));

        let mut watched = 0usize;
        for entry in self.config.listeners() {
            match entry.listener {
                ListenerKind::File => {
                    // already logged by the listener
                    if self.listener.watch(entry.options.clone()).await.is_ok() {
                        watched += 1;
                    }
                }
                ListenerKind::Unsupported => {
                    tracing::warn!(
                        path = %entry.options.path.display(),
                        "unsupported listener kind, skipping"
                    );
                }
            }
        }

        tracing::info!(
            watched,
            configured = self.config.listeners().len(),
            "logwatch running"
        );
        Ok(())
    }

    /// Starts the pipeline and blocks until SIGINT or SIGTERM.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await;
        Ok(())
    }

    /// Stops the listeners, then the ticker and the router.
    ///
    /// Routes already in flight complete before this returns.
    pub async fn shutdown(&mut self) {
        tracing::info!("stopping file listeners");
        self.listener.disable().await;

        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "pipeline task ended abnormally");
            }
        }
        tracing::info!("logwatch stopped");
    }

    pub fn config(&self) -> &LogwatchConfig {
        &self.config
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn listener(&self) -> &FileListener {
        &self.listener
    }

    pub fn alert_engine(&self) -> &AlertEngine {
        &self.alerts
    }

    /// Emission handle into the running pipeline.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

fn validate(config: &LogwatchConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))
}

/// Waits for SIGTERM or SIGINT and returns the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

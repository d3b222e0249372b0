//! Metric derivation from raw log events.
//!
//! [`MetricProducer`] maps listener paths to the metric declared in their
//! configuration entry. Every raw log read from such a path marks the
//! metric's runtime instance; [`MetricProducer::emit_metrics`] periodically
//! turns every instance into a [`MetricEvent`].
//!
//! # Instances
//! - [`Meter`]: events per second since the previous read
//! - [`Counter`]: total number of events
//!
//! Metrics of an unsupported type are tracked but never emitted.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use logwatch_core::error::PipelineError;
use logwatch_core::event::{Event, EventResult, EventType, MetricEvent};
use logwatch_core::pipeline::Handler;
use logwatch_core::types::{
    ListenerConfigEntry, ListenerKind, MetricConfig, MetricKind, MetricSample,
};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::EventBus;

/// Rate meter.
///
/// `current_rate` reports arrivals per second over the window since the
/// previous call and starts a new window.
#[derive(Debug, Clone)]
pub struct Meter {
    count: u64,
    window_count: u64,
    created: Instant,
    window_start: Instant,
}

impl Meter {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            count: 0,
            window_count: 0,
            created: now,
            window_start: now,
        }
    }

    pub fn mark(&mut self) {
        self.mark_n(1);
    }

    pub fn mark_n(&mut self, n: u64) {
        self.count += n;
        self.window_count += n;
    }

    /// Total arrivals since creation.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Arrivals per second since the previous call, then resets the window.
    ///
    /// Returns 0 when no time has elapsed.
    pub fn current_rate(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.window_count as f64 / elapsed
        } else {
            0.0
        };
        self.window_count = 0;
        self.window_start = now;
        rate
    }

    /// Arrivals per second since creation.
    pub fn mean_rate(&self) -> f64 {
        let elapsed = self.created.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.count as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic arrival counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    count: u64,
}

impl Counter {
    pub fn mark(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Runtime instance backing a metric definition.
#[derive(Debug, Clone)]
pub enum MetricInstance {
    Meter(Meter),
    Counter(Counter),
}

impl MetricInstance {
    /// Instance for `kind`, `None` for unsupported kinds.
    pub fn for_kind(kind: &MetricKind) -> Option<Self> {
        match kind {
            MetricKind::Meter => Some(Self::Meter(Meter::new())),
            MetricKind::Counter => Some(Self::Counter(Counter::default())),
            MetricKind::Unsupported => None,
        }
    }

    pub fn mark(&mut self) {
        match self {
            Self::Meter(meter) => meter.mark(),
            Self::Counter(counter) => counter.mark(),
        }
    }

    /// Value reported on emission.
    pub fn extract(&mut self) -> f64 {
        match self {
            Self::Meter(meter) => meter.current_rate(),
            Self::Counter(counter) => counter.count() as f64,
        }
    }
}

struct TrackedMetric {
    config: MetricConfig,
    instance: Option<MetricInstance>,
}

/// Derives metrics from raw logs and emits them on every tick.
pub struct MetricProducer {
    listeners: Vec<ListenerConfigEntry>,
    /// insertion order is emission order
    metrics: Mutex<Vec<TrackedMetric>>,
    bus: EventBus,
}

impl MetricProducer {
    pub fn new(listeners: Vec<ListenerConfigEntry>, bus: EventBus) -> Self {
        Self {
            listeners,
            metrics: Mutex::new(Vec::new()),
            bus,
        }
    }

    /// Names of the metrics observed so far.
    pub fn tracked(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|tracked| tracked.config.name.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrackedMetric>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn metric_for(&self, path: &std::path::Path) -> Option<&MetricConfig> {
        self.listeners
            .iter()
            .filter(|entry| entry.listener == ListenerKind::File)
            .find(|entry| entry.options.path == path)
            .and_then(|entry| entry.options.metric.as_ref())
    }

    /// Marks the metric bound to `path`, creating it on first observation.
    fn record(&self, path: &std::path::Path) {
        let Some(config) = self.metric_for(path) else {
            return;
        };

        let mut metrics = self.lock();
        let index = match metrics.iter().position(|t| t.config.name == config.name) {
            Some(index) => index,
            None => {
                debug!(
                    metric = %config.name,
                    kind = %config.kind,
                    path = %path.display(),
                    "creating metric"
                );
                metrics.push(TrackedMetric {
                    config: config.clone(),
                    instance: MetricInstance::for_kind(&config.kind),
                });
                metrics.len() - 1
            }
        };
        if let Some(instance) = metrics[index].instance.as_mut() {
            instance.mark();
        }
    }

    /// Emits one metric event per tracked metric with a value.
    ///
    /// Returns the number of events emitted.
    pub async fn emit_metrics(&self) -> usize {
        let samples: Vec<MetricSample> = {
            let mut metrics = self.lock();
            metrics
                .iter_mut()
                .filter_map(|tracked| {
                    let value = tracked.instance.as_mut()?.extract();
                    Some(MetricSample {
                        name: tracked.config.name.clone(),
                        kind: tracked.config.kind.clone(),
                        value: Some(value),
                        unit: tracked.config.unit.clone(),
                    })
                })
                .collect()
        };

        if !samples.is_empty() {
            debug!(count = samples.len(), "emitting metrics");
        }
        let count = samples.len();
        for sample in samples {
            self.bus.emit(MetricEvent::new(sample)).await;
        }
        count
    }

    /// Runs [`emit_metrics`](Self::emit_metrics) every `interval` until cancelled.
    ///
    /// The first emission happens one full interval after the call.
    pub fn spawn_ticker(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "metric ticker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.emit_metrics().await;
                    }
                    _ = cancel.cancelled() => {
                        info!("metric ticker stopped");
                        break;
                    }
                }
            }
        })
    }
}

impl Handler for MetricProducer {
    fn name(&self) -> &str {
        "metric-producer"
    }

    async fn on_event(
        &self,
        event: &Event,
        _event_type: EventType,
    ) -> Result<EventResult, PipelineError> {
        if let Event::RawLog(raw) = event {
            self.record(&raw.filepath);
        }
        Ok(EventResult::Ack)
    }
}

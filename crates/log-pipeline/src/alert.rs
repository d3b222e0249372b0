//! Alert evaluation -- threshold and cooldown over sliding sample windows.
//!
//! [`AlertEngine`] consumes metric events. Each metric watched by an alert
//! owns a bucket of its most recent samples; each alert owns an active flag.
//!
//! # Evaluation
//! For a sample `v` of metric `m` (first alert watching `m` only):
//!
//! 1. push `v`, keep the newest `max(threshold.timerange, cooldown.timerange, 1)`
//! 2. fewer than `threshold.timerange` samples: nothing to decide
//! 3. average the oldest `threshold.timerange` retained samples, and the
//!    oldest `cooldown.timerange` ones (divided by the timerange even when
//!    the bucket holds fewer)
//! 4. inactive and threshold crossed: activate, report the threshold average.
//!    Active and the opposite operator holds on the cooldown average:
//!    deactivate, report the cooldown average.
//!
//! The opposite operator is strict, so a window sitting exactly on the
//! threshold keeps the current state (hysteresis).

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use logwatch_core::error::PipelineError;
use logwatch_core::event::{AlertEvent, Event, EventResult, EventType};
use logwatch_core::metrics as m;
use logwatch_core::pipeline::Handler;
use logwatch_core::types::AlertConfig;
use tracing::info;

use crate::bus::EventBus;

/// A state change decided for one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Threshold crossed while inactive
    Triggered { value: f64 },
    /// Cooldown condition met while active
    Recovered { value: f64 },
}

impl Transition {
    pub fn active(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Triggered { value } | Self::Recovered { value } => *value,
        }
    }

    /// Reason logged with the transition.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Triggered { .. } => "above-threshold",
            Self::Recovered { .. } => "cooled-down",
        }
    }
}

#[derive(Debug, Default)]
struct AlertState {
    /// metric name -> newest samples (back = newest)
    buckets: HashMap<String, VecDeque<f64>>,
    /// alert name -> active
    active: HashMap<String, bool>,
}

/// Alert state machine fed by metric events.
pub struct AlertEngine {
    alerts: Vec<AlertConfig>,
    state: Mutex<AlertState>,
    bus: EventBus,
}

impl AlertEngine {
    pub fn new(alerts: Vec<AlertConfig>, bus: EventBus) -> Self {
        Self {
            alerts,
            state: Mutex::new(AlertState::default()),
            bus,
        }
    }

    /// First alert watching `metric`.
    pub fn alert_for(&self, metric: &str) -> Option<&AlertConfig> {
        self.alerts.iter().find(|alert| alert.metric == metric)
    }

    /// Records one sample and returns the transition it causes, if any.
    ///
    /// Runs entirely under the state lock; nothing is emitted here.
    pub fn evaluate(&self, metric: &str, value: f64) -> Option<(AlertConfig, Transition)> {
        let alert = self.alert_for(metric)?;
        let cap = alert.bucket_capacity();
        let threshold = &alert.threshold;
        // a zero window (only reachable without config validation) acts as one sample
        let threshold_range = threshold.timerange.max(1);
        let cooldown_range = alert.cooldown.timerange.max(1);

        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;

        let bucket = state.buckets.entry(metric.to_owned()).or_default();
        bucket.push_back(value);
        trim(bucket, cap);

        if bucket.len() < threshold_range {
            return None;
        }

        let avg_threshold = window_average(bucket, threshold_range);
        let avg_cooldown = window_average(bucket, cooldown_range);
        let crossed = threshold.operator.crossed(avg_threshold, threshold.value);
        let recovered = threshold
            .operator
            .opposite()
            .crossed(avg_cooldown, threshold.value);

        let active = state.active.entry(alert.name.clone()).or_insert(false);
        let transition = if crossed && !*active {
            *active = true;
            Some(Transition::Triggered {
                value: avg_threshold,
            })
        } else if recovered && *active {
            *active = false;
            Some(Transition::Recovered {
                value: avg_cooldown,
            })
        } else {
            None
        };

        if let Some(bucket) = state.buckets.get_mut(metric) {
            trim(bucket, cap);
        }

        transition.map(|t| (alert.clone(), t))
    }

    pub fn is_active(&self, alert: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.active.get(alert).copied().unwrap_or(false)
    }

    /// Samples currently retained for `metric`.
    pub fn bucket(&self, metric: &str) -> Vec<f64> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .buckets
            .get(metric)
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Drops the oldest samples until at most `cap` remain.
fn trim(bucket: &mut VecDeque<f64>, cap: usize) {
    while bucket.len() > cap {
        bucket.pop_front();
    }
}

/// Sum of the oldest `timerange` samples divided by `timerange`.
///
/// `timerange` must be at least 1.
fn window_average(bucket: &VecDeque<f64>, timerange: usize) -> f64 {
    let sum: f64 = bucket.iter().take(timerange).sum();
    sum / timerange as f64
}

impl Handler for AlertEngine {
    fn name(&self) -> &str {
        "alert-engine"
    }

    async fn on_event(
        &self,
        event: &Event,
        _event_type: EventType,
    ) -> Result<EventResult, PipelineError> {
        let Event::Metric(metric) = event else {
            return Ok(EventResult::Ack);
        };
        let Some(value) = metric.metric.value else {
            return Ok(EventResult::Ack);
        };

        let Some((alert, transition)) = self.evaluate(&metric.metric.name, value) else {
            return Ok(EventResult::Ack);
        };

        let state = if transition.active() {
            "active"
        } else {
            "inactive"
        };
        info!(
            alert = %alert.name,
            metric = %alert.metric,
            active = transition.active(),
            value = transition.value(),
            reason = transition.reason(),
            "alert state changed"
        );
        metrics::counter!(m::ALERT_TRANSITIONS_TOTAL, m::LABEL_STATE => state).increment(1);

        self.bus
            .emit(AlertEvent::new(alert, transition.active(), transition.value()))
            .await;
        Ok(EventResult::Ack)
    }
}

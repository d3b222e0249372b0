//! Event bus -- the emission handle shared by every producer.
//!
//! Producers (tail listener, log handler, metric producer, alert engine) hold
//! a clone of [`EventBus`]; the router owns the receiving end.
//! Emission is fire-and-forget: failures are logged, never returned.
//!
//! Every [`EventType`] has its own bounded lane. The router drains each lane
//! with one serial worker, so a handler that emits a derived event (a raw
//! log turning into a formatted log) only ever waits on a downstream lane and
//! can never block the lane it is being routed from.

use std::collections::HashMap;
use std::future::poll_fn;
use std::sync::Arc;
use std::task::Poll;

use logwatch_core::event::{Event, EventType};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::warn;

/// Lane order used by [`BusReceiver`].
pub const LANES: [EventType; 4] = [
    EventType::RawLog,
    EventType::FormattedLog,
    EventType::Metric,
    EventType::Alert,
];

/// Cloneable sender side of the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    lanes: Arc<HashMap<EventType, mpsc::Sender<Event>>>,
}

impl EventBus {
    /// Creates a bus with `capacity` slots per event type, and the receiver
    /// the router consumes.
    pub fn channel(capacity: usize) -> (Self, BusReceiver) {
        let mut senders = HashMap::with_capacity(LANES.len());
        let mut receivers = Vec::with_capacity(LANES.len());
        for event_type in LANES {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.insert(event_type, tx);
            receivers.push((event_type, rx));
        }
        (
            Self {
                lanes: Arc::new(senders),
            },
            BusReceiver { lanes: receivers },
        )
    }

    /// Sends an event, waiting for capacity on its lane.
    ///
    /// Returns `false` when the router is gone.
    pub async fn emit(&self, event: impl Into<Event>) -> bool {
        let event = event.into();
        let event_type = event.event_type();
        let sent = match self.lanes.get(&event_type) {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        };
        if !sent {
            warn!(event_type = %event_type, "event bus closed, event discarded");
        }
        sent
    }

    /// `true` once every lane's receiver has been dropped or closed.
    pub fn is_closed(&self) -> bool {
        self.lanes.values().all(|tx| tx.is_closed())
    }
}

/// Receiving side of the bus: one bounded receiver per event type.
#[derive(Debug)]
pub struct BusReceiver {
    lanes: Vec<(EventType, mpsc::Receiver<Event>)>,
}

impl BusReceiver {
    /// Receives the next event from whichever lane has one.
    ///
    /// Order is preserved within a lane, not across lanes. Returns `None`
    /// once every lane is closed and empty.
    pub async fn recv(&mut self) -> Option<Event> {
        poll_fn(|cx| {
            let mut open = false;
            for (_, rx) in self.lanes.iter_mut() {
                match rx.poll_recv(cx) {
                    Poll::Ready(Some(event)) => return Poll::Ready(Some(event)),
                    Poll::Ready(None) => {}
                    Poll::Pending => open = true,
                }
            }
            if open {
                Poll::Pending
            } else {
                Poll::Ready(None)
            }
        })
        .await
    }

    /// Non-blocking receive, checking lanes in [`LANES`] order.
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        let mut open = false;
        for (_, rx) in self.lanes.iter_mut() {
            match rx.try_recv() {
                Ok(event) => return Ok(event),
                Err(TryRecvError::Empty) => open = true,
                Err(TryRecvError::Disconnected) => {}
            }
        }
        Err(if open {
            TryRecvError::Empty
        } else {
            TryRecvError::Disconnected
        })
    }

    /// Splits into the per-type receivers.
    pub fn into_lanes(self) -> Vec<(EventType, mpsc::Receiver<Event>)> {
        self.lanes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwatch_core::event::{MetricEvent, RawLogEvent};
    use logwatch_core::types::{MetricKind, MetricSample};

    #[tokio::test]
    async fn emit_delivers_in_order() {
        let (bus, mut rx) = EventBus::channel(8);
        assert!(bus.emit(RawLogEvent::new("file", "first", "/tmp/a")).await);
        assert!(bus.emit(RawLogEvent::new("file", "second", "/tmp/a")).await);

        for expected in ["first", "second"] {
            match rx.recv().await {
                Some(Event::RawLog(raw)) => assert_eq!(raw.line, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn emit_after_receiver_dropped_returns_false() {
        let (bus, rx) = EventBus::channel(1);
        drop(rx);
        assert!(bus.is_closed());
        assert!(!bus.emit(RawLogEvent::new("file", "lost", "/tmp/a")).await);
    }

    #[tokio::test]
    async fn clones_share_the_channel() {
        let (bus, mut rx) = EventBus::channel(4);
        let other = bus.clone();
        other.emit(RawLogEvent::new("file", "x", "/tmp/a")).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), EventType::RawLog);
    }

    #[tokio::test]
    async fn full_lane_does_not_block_other_types() {
        let (bus, mut rx) = EventBus::channel(1);
        assert!(bus.emit(RawLogEvent::new("file", "fills", "/tmp/a")).await);

        // the raw lane is full; a metric still goes through
        let metric = MetricEvent::new(MetricSample {
            name: "hits".to_owned(),
            kind: MetricKind::Counter,
            value: Some(1.0),
            unit: "requests".to_owned(),
        });
        let sent = tokio::time::timeout(std::time::Duration::from_secs(1), bus.emit(metric))
            .await
            .expect("metric lane is independent");
        assert!(sent);

        let mut types = vec![
            rx.try_recv().unwrap().event_type(),
            rx.try_recv().unwrap().event_type(),
        ];
        types.sort_by_key(|t| t.as_str());
        assert_eq!(types, vec![EventType::Metric, EventType::RawLog]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}

//! Event router -- ACK-gated broadcast to handlers and the exporter.
//!
//! Handlers are registered per [`EventType`]. [`EventRouter::route`] runs
//! every handler of the event's type concurrently and forwards the event to
//! the exporter only when all of them answered [`EventResult::Ack`]. An event
//! type with no handlers is forwarded directly.
//!
//! # Failure isolation
//! A handler returning `Err` or panicking counts as a non-ACK for that event
//! only. The router logs it and keeps routing.
//!
//! ```text
//! EventBus lane ──> run() ──worker per type──> route(event) ──JoinSet──> handler 1..n
//!                                                   │
//!                                                   └── all Ack ──> exporter.ingest()
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use logwatch_core::event::{Event, EventResult, EventType};
use logwatch_core::metrics as m;
use logwatch_core::pipeline::{EventHandler, Exporter};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::bus::BusReceiver;

/// What happened to a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Every handler acknowledged; the exporter received the event.
    Forwarded,
    /// At least one handler did not acknowledge.
    Dropped {
        /// Handlers that answered `Ack`
        acked: usize,
        /// Handlers registered for the type
        handlers: usize,
    },
}

/// Central event router.
pub struct EventRouter {
    handlers: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
    exporter: Arc<dyn Exporter>,
}

impl EventRouter {
    pub fn new(exporter: Arc<dyn Exporter>) -> Self {
        Self {
            handlers: HashMap::new(),
            exporter,
        }
    }

    /// Appends `handler` to the handlers of `event_type`.
    pub fn register(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        debug!(
            event_type = %event_type,
            handler = handler.name(),
            "registering handler"
        );
        self.handlers.entry(event_type).or_default().push(handler);
    }

    /// Number of handlers registered for `event_type`.
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.get(&event_type).map_or(0, Vec::len)
    }

    pub fn exporter_name(&self) -> &str {
        self.exporter.name()
    }

    /// Routes one event and waits for every handler.
    pub async fn route(&self, event: Event) -> RouteOutcome {
        let event_type = event.event_type();
        metrics::counter!(m::ROUTER_EVENTS_TOTAL, m::LABEL_EVENT_TYPE => event_type.as_str())
            .increment(1);

        let handlers = self.handlers.get(&event_type).cloned().unwrap_or_default();
        let total = handlers.len();
        let event = Arc::new(event);

        let mut names = HashMap::with_capacity(total);
        let mut set = JoinSet::new();
        for handler in handlers {
            let event = Arc::clone(&event);
            let name = handler.name().to_owned();
            let abort = set.spawn(async move { handler.on_event(&event, event_type).await });
            names.insert(abort.id(), name);
        }

        let mut acked = 0;
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, Ok(EventResult::Ack))) => acked += 1,
                Ok((id, Ok(result))) => {
                    debug!(
                        event_id = %event.event_id(),
                        event_type = %event_type,
                        handler = names.get(&id).map_or("?", String::as_str),
                        result = %result,
                        "handler did not acknowledge event"
                    );
                }
                Ok((id, Err(e))) => {
                    error!(
                        event_id = %event.event_id(),
                        event_type = %event_type,
                        handler = names.get(&id).map_or("?", String::as_str),
                        error = %e,
                        "handler failed"
                    );
                    metrics::counter!(m::ROUTER_HANDLER_FAILURES_TOTAL, m::LABEL_EVENT_TYPE => event_type.as_str())
                        .increment(1);
                }
                Err(join_err) => {
                    error!(
                        event_id = %event.event_id(),
                        event_type = %event_type,
                        handler = names.get(&join_err.id()).map_or("?", String::as_str),
                        panicked = join_err.is_panic(),
                        "handler task aborted"
                    );
                    metrics::counter!(m::ROUTER_HANDLER_FAILURES_TOTAL, m::LABEL_EVENT_TYPE => event_type.as_str())
                        .increment(1);
                }
            }
        }

        if acked != total {
            debug!(
                event_id = %event.event_id(),
                event_type = %event_type,
                acked,
                handlers = total,
                "event dropped"
            );
            metrics::counter!(m::ROUTER_DROPPED_TOTAL, m::LABEL_EVENT_TYPE => event_type.as_str())
                .increment(1);
            return RouteOutcome::Dropped {
                acked,
                handlers: total,
            };
        }

        match self.exporter.ingest(&event, event_type).await {
            Ok(_) => {}
            Err(e) => {
                error!(
                    event_id = %event.event_id(),
                    event_type = %event_type,
                    exporter = self.exporter.name(),
                    error = %e,
                    "exporter failed"
                );
            }
        }
        metrics::counter!(m::ROUTER_FORWARDED_TOTAL, m::LABEL_EVENT_TYPE => event_type.as_str())
            .increment(1);
        RouteOutcome::Forwarded
    }

    /// Dispatch loop: routes every event received from the bus.
    ///
    /// One worker per event type runs on a [`TaskTracker`] and routes its
    /// lane serially, so events of a type reach the exporter in emission
    /// order and a slow handler pushes back on the producers of that type.
    /// On cancellation (or when every sender is gone) each worker finishes
    /// its in-flight route, closes its lane and discards what is left.
    pub async fn run(self: Arc<Self>, rx: BusReceiver, cancel: CancellationToken) {
        let tracker = TaskTracker::new();
        info!(exporter = self.exporter.name(), "event router started");

        for (event_type, lane) in rx.into_lanes() {
            tracker.spawn(Arc::clone(&self).drain_lane(event_type, lane, cancel.clone()));
        }

        tracker.close();
        tracker.wait().await;
        info!("event router stopped");
    }

    async fn drain_lane(
        self: Arc<Self>,
        event_type: EventType,
        mut lane: mpsc::Receiver<Event>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                received = lane.recv() => {
                    match received {
                        Some(event) => {
                            self.route(event).await;
                        }
                        None => {
                            debug!(event_type = %event_type, "lane closed");
                            break;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    debug!(event_type = %event_type, "lane worker received shutdown signal");
                    break;
                }
            }
        }

        // pending and future emits fail fast instead of waiting for capacity
        lane.close();
        let discarded = std::iter::from_fn(|| lane.try_recv().ok()).count();
        if discarded > 0 {
            warn!(event_type = %event_type, discarded, "events left on the bus at shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use logwatch_core::error::PipelineError;
    use logwatch_core::event::RawLogEvent;
    use logwatch_core::pipeline::{BoxFuture, Handler};
    use std::sync::Mutex;

    struct Fixed(&'static str, EventResult);

    impl Handler for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn on_event(&self, _: &Event, _: EventType) -> Result<EventResult, PipelineError> {
            Ok(self.1)
        }
    }

    struct Failing;

    impl Handler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_event(&self, _: &Event, _: EventType) -> Result<EventResult, PipelineError> {
            Err(PipelineError::HandlerFailed {
                handler: "failing".to_owned(),
                reason: "boom".to_owned(),
            })
        }
    }

    struct Panicking;

    impl Handler for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn on_event(&self, _: &Event, _: EventType) -> Result<EventResult, PipelineError> {
            panic!("handler bug");
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<EventType>>);

    impl Exporter for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn ingest<'a>(
            &'a self,
            _event: &'a Event,
            event_type: EventType,
        ) -> BoxFuture<'a, Result<EventResult, PipelineError>> {
            Box::pin(async move {
                self.0.lock().unwrap().push(event_type);
                Ok(EventResult::Recorded)
            })
        }
    }

    fn raw() -> Event {
        RawLogEvent::new("file", "line", "/tmp/access.log").into()
    }

    fn router_with(handlers: Vec<Arc<dyn EventHandler>>) -> (EventRouter, Arc<Recording>) {
        let exporter = Arc::new(Recording::default());
        let mut router = EventRouter::new(exporter.clone());
        for handler in handlers {
            router.register(EventType::RawLog, handler);
        }
        (router, exporter)
    }

    #[tokio::test]
    async fn forwards_when_every_handler_acks() {
        let (router, exporter) = router_with(vec![
            Arc::new(Fixed("a", EventResult::Ack)),
            Arc::new(Fixed("b", EventResult::Ack)),
        ]);

        assert_eq!(router.route(raw()).await, RouteOutcome::Forwarded);
        assert_eq!(*exporter.0.lock().unwrap(), vec![EventType::RawLog]);
    }

    #[tokio::test]
    async fn drops_when_one_handler_is_invalid() {
        let (router, exporter) = router_with(vec![
            Arc::new(Fixed("a", EventResult::Ack)),
            Arc::new(Fixed("b", EventResult::Invalid)),
        ]);

        assert_eq!(
            router.route(raw()).await,
            RouteOutcome::Dropped {
                acked: 1,
                handlers: 2
            }
        );
        assert!(exporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recorded_is_not_an_ack() {
        let (router, exporter) = router_with(vec![Arc::new(Fixed("a", EventResult::Recorded))]);
        assert!(matches!(router.route(raw()).await, RouteOutcome::Dropped { .. }));
        assert!(exporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn type_without_handlers_is_forwarded() {
        let (router, exporter) = router_with(vec![]);
        assert_eq!(router.handler_count(EventType::RawLog), 0);
        assert_eq!(router.route(raw()).await, RouteOutcome::Forwarded);
        assert_eq!(exporter.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_handler_drops_event() {
        let (router, exporter) = router_with(vec![
            Arc::new(Fixed("a", EventResult::Ack)),
            Arc::new(Failing),
        ]);
        assert!(matches!(router.route(raw()).await, RouteOutcome::Dropped { .. }));
        assert!(exporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let (router, exporter) = router_with(vec![
            Arc::new(Fixed("a", EventResult::Ack)),
            Arc::new(Panicking),
        ]);

        assert_eq!(
            router.route(raw()).await,
            RouteOutcome::Dropped {
                acked: 1,
                handlers: 2
            }
        );
        // router is still usable afterwards
        assert!(matches!(router.route(raw()).await, RouteOutcome::Dropped { .. }));
        assert!(exporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_routes_bus_events_until_cancelled() {
        let (router, exporter) = router_with(vec![Arc::new(Fixed("a", EventResult::Ack))]);
        let router = Arc::new(router);
        let (bus, rx) = EventBus::channel(8);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Arc::clone(&router).run(rx, cancel.clone()));
        for _ in 0..3 {
            assert!(bus.emit(raw()).await);
        }

        for _ in 0..100 {
            if exporter.0.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(exporter.0.lock().unwrap().len(), 3);
        assert!(bus.is_closed());
        assert!(!bus.emit(raw()).await);
    }

    #[tokio::test]
    async fn run_stops_when_bus_closes() {
        let (router, _exporter) = router_with(vec![]);
        let (bus, rx) = EventBus::channel(1);
        drop(bus);
        Arc::new(router).run(rx, CancellationToken::new()).await;
    }

    /// Holds back the first line so a later one could overtake it.
    struct SlowFirst;

    impl Handler for SlowFirst {
        fn name(&self) -> &str {
            "slow-first"
        }

        async fn on_event(&self, event: &Event, _: EventType) -> Result<EventResult, PipelineError> {
            if let Event::RawLog(raw) = event
                && raw.line == "line 1"
            {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            Ok(EventResult::Ack)
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Exporter for Lines {
        fn name(&self) -> &str {
            "lines"
        }

        fn ingest<'a>(
            &'a self,
            event: &'a Event,
            _event_type: EventType,
        ) -> BoxFuture<'a, Result<EventResult, PipelineError>> {
            Box::pin(async move {
                if let Event::RawLog(raw) = event {
                    self.0.lock().unwrap().push(raw.line.clone());
                }
                Ok(EventResult::Recorded)
            })
        }
    }

    #[tokio::test]
    async fn run_exports_a_type_in_emission_order() {
        let exporter = Arc::new(Lines::default());
        let mut router = EventRouter::new(exporter.clone());
        router.register(EventType::RawLog, Arc::new(SlowFirst));

        let (bus, rx) = EventBus::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::new(router).run(rx, cancel.clone()));

        for line in ["line 1", "line 2", "line 3"] {
            assert!(bus.emit(RawLogEvent::new("file", line, "/tmp/access.log")).await);
        }

        for _ in 0..100 {
            if exporter.0.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(*exporter.0.lock().unwrap(), vec!["line 1", "line 2", "line 3"]);
    }

    #[tokio::test]
    async fn slow_handler_pushes_back_on_its_lane() {
        let exporter = Arc::new(Lines::default());
        let mut router = EventRouter::new(exporter.clone());
        router.register(EventType::RawLog, Arc::new(SlowFirst));

        let (bus, rx) = EventBus::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::new(router).run(rx, cancel.clone()));

        // "line 1" is in flight, "line 2" takes the only slot
        assert!(bus.emit(RawLogEvent::new("file", "line 1", "/tmp/access.log")).await);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(bus.emit(RawLogEvent::new("file", "line 2", "/tmp/access.log")).await);

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            bus.emit(RawLogEvent::new("file", "line 3", "/tmp/access.log")),
        )
        .await;
        assert!(blocked.is_err(), "emit should wait while the lane is full");

        cancel.cancel();
        task.await.unwrap();
    }
}

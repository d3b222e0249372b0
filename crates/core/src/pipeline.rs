//! Pipeline traits -- extension points of the event pipeline.
//!
//! Handlers come in two flavours:
//!
//! - [`Handler`] uses RPITIT so implementations can be written with
//!   `async fn`. It is not dyn-compatible.
//! - [`EventHandler`] returns a [`BoxFuture`] and is what the router stores
//!   (`Arc<dyn EventHandler>`). Every `Handler` implements it automatically.
//!
//! [`Exporter`] is dyn-compatible from the start since exactly one is
//! selected at runtime by name.

use std::future::Future;
use std::pin::Pin;

use crate::error::PipelineError;
use crate::event::{Event, EventResult, EventType};
use crate::types::{HttpLog, LogFormat};

/// Boxed, sendable future used by the dyn-compatible traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Event handler written with `async fn`.
///
/// # Example
/// ```ignore
/// struct Audit;
///
/// impl Handler for Audit {
///     fn name(&self) -> &str { "audit" }
///
///     async fn on_event(&self, event: &Event, _: EventType)
///         -> Result<EventResult, PipelineError>
///     {
///         tracing::debug!(event = %event, "seen");
///         Ok(EventResult::Ack)
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    /// Handler name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Handles one event. Only `Ok(EventResult::Ack)` counts as acknowledged.
    fn on_event(
        &self,
        event: &Event,
        event_type: EventType,
    ) -> impl Future<Output = Result<EventResult, PipelineError>> + Send;
}

/// dyn-compatible event handler stored by the router.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;

    fn on_event<'a>(
        &'a self,
        event: &'a Event,
        event_type: EventType,
    ) -> BoxFuture<'a, Result<EventResult, PipelineError>>;
}

impl<T: Handler> EventHandler for T {
    fn name(&self) -> &str {
        Handler::name(self)
    }

    fn on_event<'a>(
        &'a self,
        event: &'a Event,
        event_type: EventType,
    ) -> BoxFuture<'a, Result<EventResult, PipelineError>> {
        Box::pin(Handler::on_event(self, event, event_type))
    }
}

/// Presentation backend receiving every acknowledged event.
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// Presents one event. Errors are logged by the caller and never retried.
    fn ingest<'a>(
        &'a self,
        event: &'a Event,
        event_type: EventType,
    ) -> BoxFuture<'a, Result<EventResult, PipelineError>>;
}

/// Log parser for one format.
///
/// Parsing is pure: no I/O, no side effects. A line that does not match the
/// format yields `None`.
pub trait LogParser: Send + Sync {
    /// Format this parser understands.
    fn format(&self) -> LogFormat;

    fn parse(&self, line: &str) -> Option<HttpLog>;
}

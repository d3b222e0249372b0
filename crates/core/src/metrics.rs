//! Metric names and descriptions.
//!
//! Every Prometheus metric logwatch records is named here so components call
//! `metrics::counter!()` with a shared constant.
//!
//! # Naming
//!
//! - prefix: `logwatch_`
//! - component: `router_`, `listener_`, `parser_`, `alert_`
//! - suffix: `_total` for counters
//!
//! ```ignore
//! metrics::counter!(logwatch_core::metrics::LISTENER_LINES_TOTAL).increment(1);
//! ```

// --- label keys ---

/// Event type label (raw_log, formatted_log, metric, alert)
pub const LABEL_EVENT_TYPE: &str = "type";

/// Alert state label (active, inactive)
pub const LABEL_STATE: &str = "state";

/// Parser format label (clf_http)
pub const LABEL_PARSER_FORMAT: &str = "format";

// --- router ---

/// Router: events received from the bus (counter, label: type)
pub const ROUTER_EVENTS_TOTAL: &str = "logwatch_router_events_total";

/// Router: events forwarded to the exporter (counter, label: type)
pub const ROUTER_FORWARDED_TOTAL: &str = "logwatch_router_forwarded_total";

/// Router: events not acknowledged by every handler (counter, label: type)
pub const ROUTER_DROPPED_TOTAL: &str = "logwatch_router_dropped_total";

/// Router: handler errors and panics (counter, label: type)
pub const ROUTER_HANDLER_FAILURES_TOTAL: &str = "logwatch_router_handler_failures_total";

// --- listener ---

/// Listener: lines emitted (counter)
pub const LISTENER_LINES_TOTAL: &str = "logwatch_listener_lines_total";

/// Listener: failed read cycles (counter)
pub const LISTENER_READ_ERRORS_TOTAL: &str = "logwatch_listener_read_errors_total";

// --- parser ---

/// Parser: lines that did not match their format (counter, label: format)
pub const PARSER_FAILURES_TOTAL: &str = "logwatch_parser_failures_total";

// --- alert ---

/// Alert: state transitions (counter, label: state)
pub const ALERT_TRANSITIONS_TOTAL: &str = "logwatch_alert_transitions_total";

/// Registers a HELP text for every metric.
///
/// Call once after the global recorder is installed.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        ROUTER_EVENTS_TOTAL,
        "Total number of events received by the router"
    );
    describe_counter!(
        ROUTER_FORWARDED_TOTAL,
        "Total number of events acknowledged by every handler and forwarded to the exporter"
    );
    describe_counter!(
        ROUTER_DROPPED_TOTAL,
        "Total number of events dropped because a handler did not acknowledge them"
    );
    describe_counter!(
        ROUTER_HANDLER_FAILURES_TOTAL,
        "Total number of handler errors and panics"
    );
    describe_counter!(
        LISTENER_LINES_TOTAL,
        "Total number of lines read from watched files"
    );
    describe_counter!(
        LISTENER_READ_ERRORS_TOTAL,
        "Total number of failed read cycles"
    );
    describe_counter!(
        PARSER_FAILURES_TOTAL,
        "Total number of lines rejected by the log parser"
    );
    describe_counter!(
        ALERT_TRANSITIONS_TOTAL,
        "Total number of alert state transitions"
    );
}

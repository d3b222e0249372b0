//! Metrics server tests.
//!
//! Only configurations that fail before installation are exercised; the
//! global recorder can be installed once per process.

use logwatch_core::config::MetricsConfig;
use logwatch_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn rejects_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_string(),
        port: 9105,
        endpoint: "/metrics".to_string(),
    };

    assert!(metrics_server::install_metrics_recorder(&config).is_err());
}

#[test]
#[serial]
fn rejects_unsupported_endpoint() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_string(),
        port: 19105,
        endpoint: "/custom".to_string(),
    };

    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();
    assert!(err.to_string().contains("/custom"));
}

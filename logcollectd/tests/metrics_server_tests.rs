//! Integration tests for metrics server functionality.

use logcollect_core::config::MetricsConfig;
use logcollectd::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_string(),
        port: 9105,
    };

    let result = metrics_server::install_metrics_recorder(&config);
    assert!(
        result.is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_succeeds_once() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_string(),
        port: 19105,
    };

    let first = metrics_server::install_metrics_recorder(&config);
    assert!(first.is_ok(), "first install should succeed: {:?}", first.err());

    // the global recorder can only be installed once per process
    let second = metrics_server::install_metrics_recorder(&MetricsConfig {
        port: 19106,
        ..config
    });
    assert!(second.is_err());
}

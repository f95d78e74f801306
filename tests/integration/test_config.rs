//! Configuration fixture tests.
//!
//! The fixture configures short waits; these tests check that a connector
//! built from it applies those defaults to omitted arguments.

use std::path::PathBuf;
use std::sync::Arc;

use indico_connector::mock::{MockClient, RemoteCall};
use indico_connector::{Connector, ConnectorConfig};
use serde_json::json;

/// Path to the sample configuration fixture.
fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample-config")
}

/// Tests that the sample config loads successfully.
#[test]
fn test_sample_config_loads() {
    let config = ConnectorConfig::load_from_dir(&fixture_dir()).expect("Failed to load config");

    assert_eq!(config.poll_interval_ms, 250);
    assert_eq!(config.timeout_ms, 2000);
    assert_eq!(config.list_limit, 50);
    assert_eq!(config.request_timeout_secs, 10);
}

/// A directory without a config file yields the built-in defaults.
#[test]
fn test_missing_config_uses_defaults() {
    let dir = fixture_dir().join("does-not-exist");
    let config = ConnectorConfig::load_from_dir(&dir).expect("Missing config should not fail");
    assert_eq!(config, ConnectorConfig::default());
}

/// Omitted limit and timeout come from the loaded configuration.
#[test]
fn test_connector_applies_configured_defaults() {
    let config = ConnectorConfig::load_from_dir(&fixture_dir()).expect("Failed to load config");
    let mock = Arc::new(
        MockClient::new().with_submission_script(9, [Ok(json!({"id": 9, "status": "PROCESSING"}))]),
    );
    let connector = Connector::new(config, mock.factory()).expect("Failed to create connector");
    connector
        .init("api-token", "https://app.indico.io")
        .expect("Failed to init connector");

    connector
        .list_submissions(None, None, None, None, None, None)
        .expect("Listing should succeed");
    let err = connector
        .submission_result(9, None, None, None)
        .expect_err("Submission never gets results");

    assert_eq!(err.message(), "Operation did not complete within 2000ms");
    let calls = mock.calls();
    let RemoteCall::ListSubmissions(query) = &calls[0] else {
        unreachable!("expected a list call");
    };
    assert_eq!(query.limit, 50);
    // 250ms cadence within a 2s deadline.
    let polls = calls.len() - 1;
    assert!((6..=9).contains(&polls), "unexpected poll count: {polls}");
}

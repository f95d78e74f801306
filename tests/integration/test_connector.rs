//! End-to-end tests for the blocking connector.
//!
//! These drive the public entry points exactly as a host would, against the
//! scripted in-memory client. No network access is needed.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use indico_connector::mock::{MockClient, RemoteCall};
use indico_connector::{Connector, ConnectorConfig, SubmissionStatus};
use indico_graphql::HttpClientFactory;
use insta::assert_snapshot;
use serde_json::json;

const INTERVAL_MS: u64 = 20;

fn config() -> ConnectorConfig {
    ConnectorConfig {
        poll_interval_ms: INTERVAL_MS,
        timeout_ms: 5_000,
        ..ConnectorConfig::default()
    }
}

fn connect(mock: MockClient) -> (Connector, Arc<MockClient>) {
    let mock = Arc::new(mock);
    let connector = Connector::new(config(), mock.factory()).expect("Failed to create connector");
    connector
        .init("api-token", "https://app.indico.io")
        .expect("Failed to init connector");
    (connector, mock)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn fetches(mock: &MockClient, id: i64) -> usize {
    mock.count_calls(|call| *call == RemoteCall::FetchSubmission(id))
}

/// Results already present on the first fetch are returned verbatim with no wait.
#[test]
fn test_submission_result_ready_on_first_fetch() {
    let snapshot = json!({
        "id": 42,
        "status": "COMPLETE",
        "results": {"document": {"results": {"Invoice Total": [{"text": "10.00"}]}}}
    });
    let (connector, mock) = connect(MockClient::new().with_submission_script(42, [Ok(snapshot)]));
    let start = Instant::now();

    let text = connector
        .submission_result(42, None, None, None)
        .expect("Result should be ready");

    assert!(start.elapsed() < Duration::from_millis(INTERVAL_MS));
    assert_eq!(fetches(&mock, 42), 1);
    assert_snapshot!(text, @r#"{"id":42,"results":{"document":{"results":{"Invoice Total":[{"text":"10.00"}]}}},"status":"COMPLETE"}"#);
}

/// A result document comes back with its own keys at the top level.
#[test]
fn test_submission_result_returns_result_document() {
    let document = json!({
        "submission_id": 42,
        "file_version": 1,
        "results": {"document": {"results": {"Invoice Total": [{"text": "10.00"}]}}}
    });
    let (connector, _mock) = connect(MockClient::new().with_submission_script(
        42,
        [Ok(json!({"id": 42, "status": "PROCESSING"})), Ok(document)],
    ));

    let text = connector
        .submission_result(42, None, None, None)
        .expect("Result should be ready");

    let parsed: serde_json::Value = serde_json::from_str(&text).expect("Result is JSON");
    assert_eq!(parsed["submission_id"], 42);
    assert!(parsed["results"]["document"].is_object());
}

/// PROCESSING, PROCESSING, COMPLETE: three fetches with two intervals between them.
#[test]
fn test_submission_result_reaches_target_status() {
    let (connector, mock) = connect(MockClient::new().with_submission_script(
        42,
        [
            Ok(json!({"id": 42, "status": "PROCESSING"})),
            Ok(json!({"id": 42, "status": "PROCESSING"})),
            Ok(json!({"id": 42, "status": "COMPLETE"})),
        ],
    ));
    let start = Instant::now();

    let text = connector
        .submission_result(42, Some("COMPLETE"), None, None)
        .expect("Submission should complete");

    assert!(start.elapsed() >= Duration::from_millis(2 * INTERVAL_MS));
    assert_eq!(fetches(&mock, 42), 3);
    assert_snapshot!(text, @r#"{"id":42,"status":"COMPLETE"}"#);
}

/// A submission that never gets results fails with the timeout message.
#[test]
fn test_submission_result_times_out() {
    let (connector, mock) = connect(
        MockClient::new().with_submission_script(42, [Ok(json!({"id": 42, "status": "PROCESSING"}))]),
    );
    let start = Instant::now();

    let err = connector
        .submission_result(42, None, Some(INTERVAL_MS), Some(100))
        .expect_err("Submission should time out");

    let elapsed = start.elapsed();
    assert_eq!(err.message(), "Operation did not complete within 100ms");
    assert!(elapsed >= Duration::from_millis(100), "timed out early: {elapsed:?}");
    assert!(fetches(&mock, 42) >= 2);
}

/// Submitting needs exactly one of the two source lists and sends nothing otherwise.
#[test]
fn test_workflow_submission_source_validation() {
    let (connector, mock) = connect(MockClient::new().with_created_ids(vec![101, 102]));
    let files = strings(&["invoice.pdf"]);
    let uris = strings(&["https://example.com/invoice.pdf"]);
    let blanks = strings(&["", " "]);

    for (f, u) in [
        (None, None),
        (Some(blanks.as_slice()), None),
        (Some(files.as_slice()), Some(uris.as_slice())),
    ] {
        assert!(connector.workflow_submission(f, u, 7).is_err());
    }
    assert!(mock.calls().is_empty());

    let ids = connector
        .workflow_submission(Some(&files), None, 7)
        .expect("Submission should succeed");
    assert_eq!(ids, vec![101, 102]);
    assert_eq!(mock.calls().len(), 1);
}

/// Status tokens are parsed before anything is sent.
#[test]
fn test_list_submissions_status_round_trip() {
    let (connector, mock) = connect(MockClient::new());

    connector
        .list_submissions(None, Some(&[3]), None, Some("COMPLETE"), None, None)
        .expect("Listing should succeed");
    let Some(RemoteCall::ListSubmissions(query)) = mock.calls().pop() else {
        unreachable!("expected a list call");
    };
    assert_eq!(query.filter.status, Some(SubmissionStatus::Complete));
    assert_eq!(query.limit, 1000);

    let err = connector
        .list_submissions(None, None, None, Some("NOT_A_STATUS"), None, None)
        .expect_err("Unknown status should be rejected");
    assert_eq!(
        err.message(),
        "Wrong status value provided. Please provide one of the valid submission statuses."
    );
    assert_eq!(mock.calls().len(), 1);
}

/// A review without changes must reject, and nothing is sent otherwise.
#[test]
fn test_submit_review_validation() {
    let (connector, mock) = connect(MockClient::new().with_job_id("job-1"));

    let err = connector
        .submit_review(42, None, false, None)
        .expect_err("Review without changes should fail");

    assert_eq!(err.message(), "Must provide Changes or Reject=true");
    assert!(mock.calls().is_empty());
}

/// The job is polled until it has results and its result document is returned.
#[test]
fn test_submit_review_waits_for_job() {
    let (connector, mock) = connect(
        MockClient::new().with_job_id("job-7").with_job_script([
            Ok(json!({"id": "job-7", "status": "PENDING", "ready": false, "results": null})),
            Ok(json!({"id": "job-7", "status": "SUCCESS", "ready": true, "results": {"submission_status": "COMPLETE", "success": true}})),
        ]),
    );

    let text = connector
        .submit_review(42, None, true, None)
        .expect("Review should complete");

    assert_snapshot!(text, @r#"{"submission_status":"COMPLETE","success":true}"#);
    let document: serde_json::Value = serde_json::from_str(&text).expect("Review output is JSON");
    assert_eq!(document["submission_status"], "COMPLETE");
    assert_eq!(document["success"], true);
    assert_eq!(
        mock.count_calls(|call| matches!(call, RemoteCall::FetchJob(_))),
        2
    );
}

/// A review that was submitted but could not be awaited says so.
#[test]
fn test_submit_review_partial_failure_names_job() {
    let (connector, _mock) = connect(
        MockClient::new()
            .with_job_id("job-8")
            .with_job_script([Err("Job store unavailable".to_string())]),
    );

    let err = connector
        .submit_review(42, Some(r#"{"Invoice Total": "12.00"}"#), false, Some(false))
        .expect_err("Awaiting the job should fail");

    assert_eq!(
        err.message(),
        "Review was submitted as job 'job-8' but its result could not be retrieved: Job store unavailable"
    );
}

/// Independent calls from several threads share the bound client.
#[test]
fn test_concurrent_calls_share_client() {
    let (connector, mock) = connect(
        MockClient::new()
            .with_submission_script(1, [Ok(json!({"id": 1, "results": [1]}))])
            .with_submission_script(2, [Ok(json!({"id": 2, "status": "PROCESSING"})), Ok(json!({"id": 2, "results": [2]}))]),
    );
    let connector = Arc::new(connector);

    let handles: Vec<_> = [1_i64, 2]
        .into_iter()
        .map(|id| {
            let connector = Arc::clone(&connector);
            thread::spawn(move || connector.submission_result(id, None, None, None))
        })
        .collect();

    for handle in handles {
        let result = handle.join().expect("Worker panicked");
        assert!(result.is_ok(), "unexpected failure: {result:?}");
    }
    assert_eq!(fetches(&mock, 1), 1);
    assert_eq!(fetches(&mock, 2), 2);
}

/// The production factory binds without touching the network.
#[test]
fn test_http_factory_init() {
    let config = ConnectorConfig::default();
    let connector = Connector::new(config.clone(), HttpClientFactory::from_config(&config))
        .expect("Failed to create connector");

    assert!(connector.init("api-token", "https://app.indico.io").is_ok());
    let err = connector
        .init("api-token", "not a uri")
        .expect_err("Relative uri should be rejected");
    assert!(err.message().starts_with("Invalid uri 'not a uri'"));
}

//! Two-phase review: submit the review, then wait for the job applying it.
//!
//! Both phases share one [`WaitScope`], so the caller's timeout bounds the
//! whole operation rather than each phase separately. A failure after the
//! job was created is reported as [`ConnectorError::ReviewIncomplete`] so
//! the caller still learns the job id and can retry the wait alone.
//!
//! A finished job yields the document under its `results` key; that document
//! is what the caller gets back.

use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::awaiter::{poll_until_ready, validate_polling, WaitScope};
use crate::client::SubmissionsClient;
use crate::error::{ConnectorError, Result};
use crate::model::{JobId, ReviewRequest, Snapshot};

/// Submits reviews and waits for their jobs.
pub struct ReviewOrchestrator<'a> {
    client: &'a dyn SubmissionsClient,
    check_interval: Duration,
    timeout: Duration,
}

impl<'a> ReviewOrchestrator<'a> {
    /// Creates an orchestrator over `client` with the given polling policy.
    #[must_use]
    pub fn new(client: &'a dyn SubmissionsClient, check_interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            check_interval,
            timeout,
        }
    }

    /// Submits `review` and returns the job's result document once it has one.
    ///
    /// Nothing is sent when the review or the polling policy is invalid.
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::Validation`] for an invalid review or policy
    /// - [`ConnectorError::Remote`], `Timeout` or `Cancelled` while submitting
    /// - [`ConnectorError::ReviewIncomplete`] when the job was created but
    ///   waiting for it failed
    #[instrument(skip(self, review, cancellation), fields(submission_id = review.submission_id))]
    pub async fn submit(
        &self,
        review: ReviewRequest,
        cancellation: CancellationToken,
    ) -> Result<Snapshot> {
        review.validate()?;
        validate_polling(self.check_interval, self.timeout)?;

        let scope = WaitScope::new(self.timeout, cancellation);

        let job_id = scope.run(self.client.submit_review(&review)).await?;
        info!(%job_id, rejected = review.rejected, "Review submitted");

        let client = self.client;
        poll_until_ready(&scope, job_id.clone(), None, self.check_interval, |id: JobId| {
            async move { client.fetch_job(&id).await }.boxed()
        })
        .await
        .map(job_result)
        .map_err(|err| ConnectorError::review_incomplete(job_id, err))
    }
}

fn job_result(job: Snapshot) -> Snapshot {
    match job {
        Value::Object(mut fields) => fields.remove("results").unwrap_or(Value::Object(fields)),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::json;
    use tokio::time::{sleep, Instant};

    use super::*;
    use crate::mock::{MockClient, RemoteCall};

    const INTERVAL: Duration = Duration::from_secs(1);

    fn rejection(submission_id: i64) -> ReviewRequest {
        ReviewRequest {
            submission_id,
            changes: None,
            rejected: true,
            force_complete: None,
        }
    }

    fn is_job_fetch(call: &RemoteCall) -> bool {
        matches!(call, RemoteCall::FetchJob(_))
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_returns_job_result_document() {
        let job = json!({"id": "job-1", "status": "SUCCESS", "ready": true, "results": {"submission_status": "COMPLETE", "success": true}});
        let client = MockClient::new()
            .with_job_id("job-1")
            .with_job_script([Ok(json!({"id": "job-1", "status": "PENDING", "ready": false})), Ok(job)]);

        let result = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(10))
            .submit(rejection(5), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, json!({"submission_status": "COMPLETE", "success": true}));
        assert_eq!(client.count_calls(is_job_fetch), 2);
        assert_eq!(client.calls()[0], RemoteCall::SubmitReview(rejection(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_review_sends_nothing() {
        let client = MockClient::new().with_job_id("job-1");
        let review = ReviewRequest {
            rejected: false,
            ..rejection(5)
        };

        let err = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(10))
            .submit(review, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(client.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_policy_sends_nothing() {
        let client = MockClient::new().with_job_id("job-1");

        let err = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_millis(200))
            .submit(rejection(5), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(client.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_is_plain_remote_error() {
        let client = MockClient::new().with_review_failure("submission 5 is not reviewable");

        let err = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(10))
            .submit(rejection(5), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_remote());
        assert_eq!(client.count_calls(is_job_fetch), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_failure_reports_job_id() {
        let client = MockClient::new()
            .with_job_id("job-9")
            .with_job_script([Err("job store unavailable".to_string())]);

        let err = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(10))
            .submit(rejection(5), CancellationToken::new())
            .await
            .unwrap_err();

        let ConnectorError::ReviewIncomplete { job_id, source } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(job_id.as_str(), "job-9");
        assert!(source.is_remote());
        assert!(err.to_string().contains("job-9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_deadline_spans_both_phases() {
        let client = MockClient::new()
            .with_job_id("job-2")
            .with_job_script([Ok(json!({"id": "job-2", "ready": false}))]);
        let start = Instant::now();

        let err = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(3))
            .submit(rejection(5), CancellationToken::new())
            .await
            .unwrap_err();

        let ConnectorError::ReviewIncomplete { source, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(source.is_timeout());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed <= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_wait() {
        let client = MockClient::new()
            .with_job_id("job-3")
            .with_job_script([Ok(json!({"id": "job-3", "ready": false}))]);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let err = ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(60))
            .submit(rejection(5), token)
            .await
            .unwrap_err();

        let ConnectorError::ReviewIncomplete { source, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(source.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_complete_is_forwarded_verbatim() {
        let client = MockClient::new()
            .with_job_id("job-4")
            .with_job_script([Ok(json!({"results": {"ok": true}}))]);
        let review = ReviewRequest {
            submission_id: 8,
            changes: Some(json!({"field": "value"})),
            rejected: false,
            force_complete: Some(false),
        };

        ReviewOrchestrator::new(&client, INTERVAL, Duration::from_secs(10))
            .submit(review.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.calls()[0], RemoteCall::SubmitReview(review));
    }
}

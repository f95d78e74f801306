//! Blocking-style readiness polling over an asynchronous fetch.
//!
//! [`wait_ready`] turns "keep checking until this resource is done" into one
//! awaitable call. It fetches the resource, evaluates the readiness
//! predicate, and sleeps a fixed interval between attempts until the
//! resource is ready or its [`WaitScope`] ends:
//!
//! ```text
//! Polling ──ready──────────▶ Ready
//!    │ ──deadline──────────▶ TimedOut   (ConnectorError::Timeout)
//!    │ ──token cancelled───▶ Cancelled  (ConnectorError::Cancelled)
//!    └ ──fetch failed──────▶ RemoteFailure (ConnectorError::Remote, no retry)
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{ConnectorError, Result};
use crate::model::Snapshot;
use crate::readiness::{is_ready, snapshot_status};
use crate::status::SubmissionStatus;

/// A deadline plus an external cancellation token.
///
/// One scope bounds a whole host call; multi-phase operations share it so a
/// single deadline spans every phase.
#[derive(Debug, Clone)]
pub struct WaitScope {
    deadline: Instant,
    timeout: Duration,
    token: CancellationToken,
}

impl WaitScope {
    /// Starts a scope that ends `timeout` from now or when `token` fires.
    #[must_use]
    pub fn new(timeout: Duration, token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
            token,
        }
    }

    /// The timeout this scope was created with.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Resolves once the scope ends, yielding the matching failure.
    pub async fn ended(&self) -> ConnectorError {
        tokio::select! {
            biased;
            () = self.token.cancelled() => ConnectorError::Cancelled,
            () = sleep_until(self.deadline) => ConnectorError::timeout(self.timeout),
        }
    }

    /// Drives `fut` to completion unless the scope ends first.
    pub async fn run<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            err = self.ended() => Err(err),
            result = fut => result,
        }
    }
}

/// Everything needed to wait for one resource.
#[derive(Debug, Clone)]
pub struct AwaitRequest<I> {
    /// Resource to poll.
    pub resource_id: I,
    /// Status to wait for; `None` waits for results to be present.
    pub target_status: Option<SubmissionStatus>,
    /// Pause between two fetches.
    pub poll_interval: Duration,
    /// Overall bound on the wait.
    pub timeout: Duration,
    /// External cancellation.
    pub cancellation: CancellationToken,
}

impl<I> AwaitRequest<I> {
    /// Checks the polling parameters.
    pub fn validate(&self) -> Result<()> {
        validate_polling(self.poll_interval, self.timeout)
    }
}

/// Rejects a zero interval, or a timeout that leaves no room for a second poll.
pub fn validate_polling(poll_interval: Duration, timeout: Duration) -> Result<()> {
    if poll_interval.is_zero() {
        return Err(ConnectorError::validation(
            "Check interval must be greater than 0",
        ));
    }

    if timeout < poll_interval {
        return Err(ConnectorError::validation(format!(
            "Timeout ({}ms) must not be shorter than the check interval ({}ms)",
            timeout.as_millis(),
            poll_interval.as_millis()
        )));
    }

    Ok(())
}

/// Polls `fetch` until the resource is ready.
///
/// Fails with a validation error before any fetch when the polling
/// parameters are inconsistent.
pub async fn wait_ready<'a, I, F>(request: AwaitRequest<I>, fetch: F) -> Result<Snapshot>
where
    I: Clone + Display + Send,
    F: Fn(I) -> BoxFuture<'a, Result<Snapshot>>,
{
    request.validate()?;

    let scope = WaitScope::new(request.timeout, request.cancellation);
    poll_until_ready(
        &scope,
        request.resource_id,
        request.target_status,
        request.poll_interval,
        fetch,
    )
    .await
}

/// The polling loop, bounded by an existing scope.
///
/// Returns the first snapshot that satisfies the readiness predicate without
/// a trailing sleep. A failed fetch ends the wait immediately.
#[instrument(skip(scope, resource_id, poll_interval, fetch), fields(resource_id = %resource_id))]
pub async fn poll_until_ready<'a, I, F>(
    scope: &WaitScope,
    resource_id: I,
    target_status: Option<SubmissionStatus>,
    poll_interval: Duration,
    fetch: F,
) -> Result<Snapshot>
where
    I: Clone + Display + Send,
    F: Fn(I) -> BoxFuture<'a, Result<Snapshot>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let fetched = scope
            .run(async { fetch(resource_id.clone()).await.map_err(into_remote) })
            .await;
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(log_failure(err, attempt)),
        };

        let observed = snapshot_status(&snapshot);
        debug!(attempt, status = ?observed, "Polled resource");

        if is_ready(&snapshot, target_status) {
            info!(attempt, status = ?observed, "Resource is ready");
            return Ok(snapshot);
        }

        if let Err(err) = scope
            .run(async {
                sleep(poll_interval).await;
                Ok(())
            })
            .await
        {
            return Err(log_failure(err, attempt));
        }
    }
}

/// Fetch failures always surface as remote failures.
fn into_remote(err: ConnectorError) -> ConnectorError {
    match err {
        ConnectorError::Remote { .. } => err,
        other => ConnectorError::remote(other.to_string()),
    }
}

fn log_failure(err: ConnectorError, attempts: u32) -> ConnectorError {
    match &err {
        ConnectorError::Timeout { timeout } => {
            warn!(attempts, timeout = ?timeout, "Resource not ready before deadline");
        }
        ConnectorError::Cancelled => warn!(attempts, "Wait cancelled"),
        _ => warn!(attempts, error = %err, "Fetch failed"),
    }
    err
}

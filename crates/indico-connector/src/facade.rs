//! Blocking entry points for hosts that can only call plain functions.
//!
//! [`Connector`] owns a small tokio runtime and blocks the calling thread on
//! it for the whole duration of each call. Every entry point funnels through
//! one adapter that turns any [`ConnectorError`] into a message-only
//! [`HostError`]; nothing below this module ever sees that flattening.

use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::awaiter::{wait_ready, AwaitRequest};
use crate::client::{ClientFactory, SubmissionsClient};
use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, HostError, Result};
use crate::model::{ListQuery, ReviewRequest, SubmissionFilter, SubmissionSources};
use crate::review::ReviewOrchestrator;
use crate::status::{parse_bool, parse_status};

const NOT_INITIALIZED: &str = "No Init method was called before.";

/// Synchronous connector over the asynchronous submissions service.
///
/// The only state kept between calls is the client bound by [`init`]. A
/// later `init` replaces it for subsequent calls; calls already in flight
/// keep the client they started with.
///
/// [`init`]: Connector::init
pub struct Connector {
    runtime: Runtime,
    config: ConnectorConfig,
    factory: Box<dyn ClientFactory>,
    client: RwLock<Option<Arc<dyn SubmissionsClient>>>,
    cancellation: Mutex<CancellationToken>,
}

impl Connector {
    /// Creates an uninitialized connector.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the runtime cannot be started.
    pub fn new(
        config: ConnectorConfig,
        factory: impl ClientFactory + 'static,
    ) -> std::result::Result<Self, HostError> {
        let build = || -> Result<Self> {
            config.validate()?;
            let runtime = Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("connector-io")
                .enable_all()
                .build()
                .map_err(|e| {
                    ConnectorError::invalid_state(format!("Failed to start async runtime: {e}"))
                })?;

            Ok(Self {
                runtime,
                config,
                factory: Box::new(factory),
                client: RwLock::new(None),
                cancellation: Mutex::new(CancellationToken::new()),
            })
        };
        build().map_err(flatten("new"))
    }

    /// The configuration supplying defaults for omitted arguments.
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Binds the connector to a service endpoint.
    pub fn init(&self, token: &str, uri: &str) -> std::result::Result<(), HostError> {
        self.boundary("init", || {
            let token = token.trim();
            if token.is_empty() {
                return Err(ConnectorError::validation("Token must not be empty."));
            }
            if uri.trim().is_empty() {
                return Err(ConnectorError::validation("Uri must not be empty."));
            }

            let uri = Url::parse(uri.trim())
                .map_err(|e| ConnectorError::validation(format!("Invalid uri '{uri}': {e}")))?;
            if !matches!(uri.scheme(), "http" | "https") {
                return Err(ConnectorError::validation(format!(
                    "Uri must use http or https, got '{}'.",
                    uri.scheme()
                )));
            }

            let client = self.factory.connect(token, &uri)?;
            let mut slot = self
                .client
                .write()
                .map_err(|_| ConnectorError::invalid_state("Client handle lock poisoned"))?;
            let replaced = slot.replace(client).is_some();

            info!(host = %uri, replaced, "Connector initialized");
            Ok(())
        })
    }

    /// Submits documents to a workflow and returns the new submission ids.
    ///
    /// Exactly one of `filepaths` and `uris` must hold a non-blank entry.
    pub fn workflow_submission(
        &self,
        filepaths: Option<&[String]>,
        uris: Option<&[String]>,
        workflow_id: i64,
    ) -> std::result::Result<Vec<i64>, HostError> {
        self.boundary("workflow_submission", || {
            let client = self.client()?;
            let sources = SubmissionSources::from_args(filepaths, uris)?;
            info!(workflow_id, documents = sources.len(), "Creating submissions");

            let scope = self.call_token()?;
            let ids = self.block_on(async {
                tokio::select! {
                    biased;
                    () = scope.cancelled() => Err(ConnectorError::Cancelled),
                    ids = client.create_submission(workflow_id, &sources) => ids,
                }
            })?;

            info!(workflow_id, ?ids, "Submissions created");
            Ok(ids)
        })
    }

    /// Lists submissions and returns them as JSON text.
    ///
    /// Blank `status`, `retrieved` and `input_filename` impose no constraint.
    /// `limit` falls back to the configured listing limit.
    pub fn list_submissions(
        &self,
        submission_ids: Option<&[i64]>,
        workflow_ids: Option<&[i64]>,
        input_filename: Option<&str>,
        status: Option<&str>,
        retrieved: Option<&str>,
        limit: Option<u32>,
    ) -> std::result::Result<String, HostError> {
        self.boundary("list_submissions", || {
            let client = self.client()?;
            let filter = SubmissionFilter::new(
                input_filename,
                parse_status(status)?,
                parse_bool(retrieved)?,
            );
            let query = ListQuery::new(
                submission_ids,
                workflow_ids,
                filter,
                limit.unwrap_or(self.config.list_limit),
            );
            debug!(?query, "Listing submissions");

            let scope = self.call_token()?;
            let submissions = self.block_on(async {
                tokio::select! {
                    biased;
                    () = scope.cancelled() => Err(ConnectorError::Cancelled),
                    listed = client.list_submissions(&query) => listed,
                }
            })?;

            info!(count = submissions.len(), "Submissions listed");
            Ok(serde_json::to_string(&submissions)?)
        })
    }

    /// Waits for a submission and returns its snapshot as JSON text.
    ///
    /// With `check_status`, waits until the submission reaches that status;
    /// without, until it has results. Interval and timeout default to the
    /// configured values.
    pub fn submission_result(
        &self,
        submission_id: i64,
        check_status: Option<&str>,
        check_interval_ms: Option<u64>,
        timeout_ms: Option<u64>,
    ) -> std::result::Result<String, HostError> {
        self.boundary("submission_result", || {
            let client = self.client()?;
            let request = AwaitRequest {
                resource_id: submission_id,
                target_status: parse_status(check_status)?,
                poll_interval: check_interval_ms
                    .map_or_else(|| self.config.poll_interval(), Duration::from_millis),
                timeout: timeout_ms.map_or_else(|| self.config.timeout(), Duration::from_millis),
                cancellation: self.call_token()?,
            };
            info!(
                submission_id,
                target = ?request.target_status,
                interval = ?request.poll_interval,
                timeout = ?request.timeout,
                "Waiting for submission"
            );

            let client = &*client;
            let snapshot = self.block_on(wait_ready(request, |id: i64| {
                async move { client.fetch_submission(id).await }.boxed()
            }))?;

            Ok(serde_json::to_string(&snapshot)?)
        })
    }

    /// Submits a review, waits for its job and returns the job's result
    /// document as JSON text.
    ///
    /// `changes` is JSON text; blank means "no changes". A review must carry
    /// changes or reject the submission.
    pub fn submit_review(
        &self,
        submission_id: i64,
        changes: Option<&str>,
        rejected: bool,
        force_complete: Option<bool>,
    ) -> std::result::Result<String, HostError> {
        self.boundary("submit_review", || {
            let client = self.client()?;
            let review = ReviewRequest {
                submission_id,
                changes: parse_changes(changes)?,
                rejected,
                force_complete,
            };
            review.validate()?;

            let orchestrator = ReviewOrchestrator::new(
                client.as_ref(),
                self.config.poll_interval(),
                self.config.timeout(),
            );
            let cancellation = self.call_token()?;
            let job = self.block_on(orchestrator.submit(review, cancellation))?;

            Ok(serde_json::to_string(&job)?)
        })
    }

    /// Cancels every call currently in flight.
    ///
    /// The affected calls fail as cancelled rather than timed out. Calls
    /// started afterwards are unaffected.
    pub fn cancel_all(&self) {
        match self.cancellation.lock() {
            Ok(mut parent) => {
                parent.cancel();
                *parent = CancellationToken::new();
                info!("Cancelled all in-flight calls");
            }
            Err(_) => warn!("Cancellation lock poisoned; nothing cancelled"),
        }
    }

    /// The one place where errors lose their kind.
    fn boundary<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce() -> Result<T>,
    ) -> std::result::Result<T, HostError> {
        body().map_err(flatten(operation))
    }

    fn client(&self) -> Result<Arc<dyn SubmissionsClient>> {
        let slot = self
            .client
            .read()
            .map_err(|_| ConnectorError::invalid_state("Client handle lock poisoned"))?;
        slot.clone()
            .ok_or_else(|| ConnectorError::invalid_state(NOT_INITIALIZED))
    }

    /// A token for one call, fired by [`Connector::cancel_all`].
    fn call_token(&self) -> Result<CancellationToken> {
        self.cancellation
            .lock()
            .map(|parent| parent.child_token())
            .map_err(|_| ConnectorError::invalid_state("Cancellation lock poisoned"))
    }

    /// Blocks the calling thread until `fut` resolves.
    fn block_on<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if Handle::try_current().is_ok() {
            return Err(ConnectorError::invalid_state(
                "Connector calls block the calling thread and cannot run inside an async runtime.",
            ));
        }
        self.runtime.block_on(fut)
    }
}

fn parse_changes(changes: Option<&str>) -> Result<Option<Value>> {
    match changes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| ConnectorError::validation(format!("Invalid changes JSON: {e}"))),
    }
}

fn flatten(operation: &'static str) -> impl Fn(ConnectorError) -> HostError {
    move |err| {
        warn!(operation, error = %err, "Connector call failed");
        HostError::from(err)
    }
}

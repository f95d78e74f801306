//! The remote submissions service as seen by the connector.
//!
//! Transport, authentication and upload mechanics live behind
//! [`SubmissionsClient`]. The connector only needs these five asynchronous
//! capabilities and a [`ClientFactory`] that binds them to credentials.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::model::{JobId, ListQuery, ReviewRequest, Snapshot, Submission, SubmissionSources};

/// Asynchronous operations offered by the submissions service.
#[async_trait]
pub trait SubmissionsClient: Send + Sync {
    /// Submits documents to a workflow and returns the new submission ids,
    /// in the order the service created them.
    async fn create_submission(
        &self,
        workflow_id: i64,
        sources: &SubmissionSources,
    ) -> Result<Vec<i64>>;

    /// Lists submissions matching the query.
    async fn list_submissions(&self, query: &ListQuery) -> Result<Vec<Submission>>;

    /// Fetches the current snapshot of a submission.
    async fn fetch_submission(&self, id: i64) -> Result<Snapshot>;

    /// Submits a review and returns the id of the job that applies it.
    async fn submit_review(&self, review: &ReviewRequest) -> Result<JobId>;

    /// Fetches the current snapshot of a job.
    async fn fetch_job(&self, id: &JobId) -> Result<Snapshot>;
}

/// Builds service handles bound to a token and a base URI.
pub trait ClientFactory: Send + Sync {
    /// Creates a client for the given credentials.
    fn connect(&self, token: &str, uri: &Url) -> Result<Arc<dyn SubmissionsClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str, &Url) -> Result<Arc<dyn SubmissionsClient>> + Send + Sync,
{
    fn connect(&self, token: &str, uri: &Url) -> Result<Arc<dyn SubmissionsClient>> {
        self(token, uri)
    }
}

//! Scripted in-memory [`SubmissionsClient`] for tests.
//!
//! Fetch responses are replayed in order and the last one repeats once the
//! script is exhausted. Every call is recorded so tests can assert on what
//! reached the "remote" side.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use url::Url;

use crate::client::{ClientFactory, SubmissionsClient};
use crate::error::{ConnectorError, Result};
use crate::model::{JobId, ListQuery, ReviewRequest, Snapshot, Submission, SubmissionSources};

/// A scripted response: a snapshot, or the message of a remote failure.
pub type MockResponse = std::result::Result<Snapshot, String>;

/// A call that reached the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `create_submission`
    CreateSubmission {
        /// Target workflow.
        workflow_id: i64,
        /// Submitted sources.
        sources: SubmissionSources,
    },
    /// `list_submissions`
    ListSubmissions(ListQuery),
    /// `fetch_submission`
    FetchSubmission(i64),
    /// `submit_review`
    SubmitReview(ReviewRequest),
    /// `fetch_job`
    FetchJob(JobId),
}

#[derive(Debug, Default)]
struct MockState {
    created_ids: Vec<i64>,
    submissions: Vec<Submission>,
    submission_scripts: HashMap<i64, VecDeque<MockResponse>>,
    job_id: Option<JobId>,
    review_failure: Option<String>,
    job_script: VecDeque<MockResponse>,
    calls: Vec<RemoteCall>,
}

/// In-memory submissions service.
#[derive(Debug, Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    /// Creates an empty mock; unscripted operations fail as remote errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids returned by `create_submission`.
    #[must_use]
    pub fn with_created_ids(self, ids: Vec<i64>) -> Self {
        self.lock().created_ids = ids;
        self
    }

    /// Submissions returned by `list_submissions`.
    #[must_use]
    pub fn with_submissions(self, submissions: Vec<Submission>) -> Self {
        self.lock().submissions = submissions;
        self
    }

    /// Responses replayed by `fetch_submission` for one id.
    #[must_use]
    pub fn with_submission_script(
        self,
        id: i64,
        script: impl IntoIterator<Item = MockResponse>,
    ) -> Self {
        self.lock()
            .submission_scripts
            .insert(id, script.into_iter().collect());
        self
    }

    /// Job id returned by `submit_review`.
    #[must_use]
    pub fn with_job_id(self, id: impl Into<JobId>) -> Self {
        self.lock().job_id = Some(id.into());
        self
    }

    /// Makes `submit_review` fail with the given message.
    #[must_use]
    pub fn with_review_failure(self, message: impl Into<String>) -> Self {
        self.lock().review_failure = Some(message.into());
        self
    }

    /// Responses replayed by `fetch_job`.
    #[must_use]
    pub fn with_job_script(self, script: impl IntoIterator<Item = MockResponse>) -> Self {
        self.lock().job_script = script.into_iter().collect();
        self
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&RemoteCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// A factory that hands out this mock regardless of credentials.
    #[must_use]
    pub fn factory(self: &Arc<Self>) -> impl ClientFactory {
        let client = Arc::clone(self);
        move |_token: &str, _uri: &Url| -> Result<Arc<dyn SubmissionsClient>> {
            Ok(Arc::clone(&client) as Arc<dyn SubmissionsClient>)
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pops the next scripted response, keeping the last one for repeats.
fn next_response(script: &mut VecDeque<MockResponse>) -> Option<MockResponse> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

fn into_result(response: Option<MockResponse>, missing: impl FnOnce() -> String) -> Result<Snapshot> {
    match response {
        Some(Ok(snapshot)) => Ok(snapshot),
        Some(Err(message)) => Err(ConnectorError::remote(message)),
        None => Err(ConnectorError::remote(missing())),
    }
}

#[async_trait]
impl SubmissionsClient for MockClient {
    async fn create_submission(
        &self,
        workflow_id: i64,
        sources: &SubmissionSources,
    ) -> Result<Vec<i64>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateSubmission {
            workflow_id,
            sources: sources.clone(),
        });
        Ok(state.created_ids.clone())
    }

    async fn list_submissions(&self, query: &ListQuery) -> Result<Vec<Submission>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::ListSubmissions(query.clone()));
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(state.submissions.iter().take(limit).cloned().collect())
    }

    async fn fetch_submission(&self, id: i64) -> Result<Snapshot> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchSubmission(id));
        let response = state
            .submission_scripts
            .get_mut(&id)
            .and_then(next_response);
        into_result(response, || format!("Submission {id} not found"))
    }

    async fn submit_review(&self, review: &ReviewRequest) -> Result<JobId> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::SubmitReview(review.clone()));
        if let Some(message) = &state.review_failure {
            return Err(ConnectorError::remote(message.clone()));
        }
        state
            .job_id
            .clone()
            .ok_or_else(|| ConnectorError::remote("No job scripted for review"))
    }

    async fn fetch_job(&self, id: &JobId) -> Result<Snapshot> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchJob(id.clone()));
        let response = next_response(&mut state.job_script);
        into_result(response, || format!("Job {id} not found"))
    }
}

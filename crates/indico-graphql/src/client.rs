//! [`SubmissionsClient`] over the Indico HTTP and GraphQL endpoints.

use std::path::Path;

use async_trait::async_trait;
use indico_connector::{
    ConnectorError, JobId, ListQuery, Result, ReviewRequest, Snapshot, Submission,
    SubmissionSources, SubmissionsClient,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use url::Url;

use crate::queries::{
    self, JobData, ListSubmissionsData, SubmissionData, SubmitAutoReviewData,
    WorkflowSubmissionData, WorkflowUrlSubmissionData,
};

const REFRESH_TOKEN_PATH: &str = "/auth/users/refresh_token";
const GRAPHQL_PATH: &str = "/graph/api/graphql";
const UPLOAD_PATH: &str = "/storage/files/store";

/// Longest slice of an error body quoted in a failure message.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    auth_token: String,
}

/// Client for one Indico host, authenticated with an API token.
///
/// The API token is exchanged for a short-lived auth token on first use. The
/// auth token is reused until the service rejects it with 401, at which point
/// it is refreshed and the rejected request is sent once more.
pub struct IndicoClient {
    http: Client,
    host: Url,
    api_token: String,
    auth_token: RwLock<Option<String>>,
}

impl IndicoClient {
    /// Creates a client; no request is made until the first operation.
    #[must_use]
    pub fn new(http: Client, api_token: &str, host: Url) -> Self {
        Self {
            http,
            host,
            api_token: api_token.to_string(),
            auth_token: RwLock::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.host
            .join(path)
            .map_err(|e| ConnectorError::remote(format!("Invalid endpoint '{path}': {e}")))
    }

    async fn auth_token(&self) -> Result<String> {
        let cached = self.auth_token.read().await.clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let mut slot = self.auth_token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.refresh_token().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Forgets `stale` unless another call already replaced it.
    async fn invalidate(&self, stale: &str) {
        let mut slot = self.auth_token.write().await;
        if slot.as_deref() == Some(stale) {
            *slot = None;
        }
    }

    /// Sends an authenticated request, refreshing the auth token once if the
    /// service rejects it.
    async fn send<F>(&self, what: &str, build: F) -> Result<Response>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let mut refreshed = false;
        loop {
            let token = self.auth_token().await?;
            let response = build(&token)
                .send()
                .await
                .map_err(|e| transport(what, &e))?;

            if !should_reauthenticate(response.status(), refreshed) {
                return Ok(response);
            }
            debug!(what, "Auth token rejected, refreshing");
            self.invalidate(&token).await;
            refreshed = true;
        }
    }

    async fn refresh_token(&self) -> Result<String> {
        debug!(host = %self.host, "Refreshing auth token");
        let response = self
            .http
            .post(self.endpoint(REFRESH_TOKEN_PATH)?)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| transport("refresh auth token", &e))?;

        let body: RefreshResponse = read_json(response).await?;
        Ok(body.auth_token)
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let url = self.endpoint(GRAPHQL_PATH)?;
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .send("GraphQL request", |token| {
                self.http.post(url.clone()).bearer_auth(token).json(&body)
            })
            .await?;

        queries::decode(read_json(response).await?)
    }

    /// Uploads local files and returns the `FileInput` values that reference them.
    async fn upload(&self, paths: &[std::path::PathBuf]) -> Result<Vec<Value>> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                ConnectorError::validation(format!("Failed to read '{}': {e}", path.display()))
            })?;
            documents.push((file_name(path), bytes));
        }

        let url = self.endpoint(UPLOAD_PATH)?;
        let response = self
            .send("file upload", |token| {
                let form = documents.iter().fold(Form::new(), |form, (name, bytes)| {
                    form.part(name.clone(), Part::bytes(bytes.clone()).file_name(name.clone()))
                });
                self.http.post(url.clone()).bearer_auth(token).multipart(form)
            })
            .await?;

        let stored: Vec<Value> = read_json(response).await?;
        let mut files = Vec::with_capacity(stored.len());
        for meta in stored {
            let filename = meta.get("name").cloned().unwrap_or(Value::Null);
            let filemeta = serde_json::to_string(&meta)?;
            files.push(json!({ "filename": filename, "filemeta": filemeta }));
        }
        Ok(files)
    }

    async fn download(&self, result_file: &str) -> Result<Value> {
        let url = self.endpoint(&queries::storage_path(result_file))?;
        let response = self
            .send("result download", |token| {
                self.http.get(url.clone()).bearer_auth(token)
            })
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl SubmissionsClient for IndicoClient {
    #[instrument(skip(self, sources), fields(documents = sources.len()))]
    async fn create_submission(
        &self,
        workflow_id: i64,
        sources: &SubmissionSources,
    ) -> Result<Vec<i64>> {
        let ids = match sources {
            SubmissionSources::Urls(urls) => {
                let urls: Vec<&str> = urls.iter().map(Url::as_str).collect();
                let data: WorkflowUrlSubmissionData = self
                    .graphql(
                        queries::WORKFLOW_URL_SUBMISSION,
                        json!({ "workflowId": workflow_id, "urls": urls }),
                    )
                    .await?;
                data.workflow_url_submission.submission_ids
            }
            SubmissionSources::Files(paths) => {
                let files = self.upload(paths).await?;
                let data: WorkflowSubmissionData = self
                    .graphql(
                        queries::WORKFLOW_SUBMISSION,
                        json!({ "workflowId": workflow_id, "files": files }),
                    )
                    .await?;
                data.workflow_submission.submission_ids
            }
        };

        info!(?ids, "Workflow submission accepted");
        Ok(ids)
    }

    #[instrument(skip(self, query), fields(limit = query.limit))]
    async fn list_submissions(&self, query: &ListQuery) -> Result<Vec<Submission>> {
        let data: ListSubmissionsData = self
            .graphql(
                &queries::list_submissions_query(),
                queries::list_variables(query),
            )
            .await?;
        Ok(data.submissions.submissions)
    }

    #[instrument(skip(self))]
    async fn fetch_submission(&self, id: i64) -> Result<Snapshot> {
        let data: SubmissionData = self
            .graphql(&queries::submission_query(), json!({ "submissionId": id }))
            .await?;
        let row = data
            .submission
            .ok_or_else(|| ConnectorError::remote(format!("Submission {id} not found")))?;

        let Some(file) = queries::result_file(&row) else {
            return Ok(row);
        };
        debug!(%file, "Downloading submission result");
        let document = self.download(file).await?;
        Ok(queries::result_document(&row, document))
    }

    #[instrument(skip(self, review), fields(submission_id = review.submission_id))]
    async fn submit_review(&self, review: &ReviewRequest) -> Result<JobId> {
        let data: SubmitAutoReviewData = self
            .graphql(queries::SUBMIT_AUTO_REVIEW, queries::review_variables(review)?)
            .await?;
        Ok(JobId::from(data.submit_auto_review.job_id))
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn fetch_job(&self, id: &JobId) -> Result<Snapshot> {
        let data: JobData = self
            .graphql(queries::JOB, json!({ "id": id.as_str() }))
            .await?;
        data.job
            .map(queries::job_snapshot)
            .ok_or_else(|| ConnectorError::remote(format!("Job {id} not found")))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// Only a 401 on the first attempt earns a fresh auth token.
fn should_reauthenticate(status: StatusCode, refreshed: bool) -> bool {
    status == StatusCode::UNAUTHORIZED && !refreshed
}

fn transport(what: &str, err: &reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::remote(format!("{what} timed out: {err}"))
    } else {
        ConnectorError::remote(format!("{what} failed: {err}"))
    }
}

/// Reads a JSON body, turning non-success statuses into remote failures.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ConnectorError::remote(format!(
            "Indico API error {status}: {}",
            body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ConnectorError::remote(format!("Failed to parse response: {e}")))
}

//! GraphQL documents, variable builders and response decoding.
//!
//! Everything here is pure so it can be tested without a server.

use indico_connector::{ConnectorError, ListQuery, Result, ReviewRequest, Snapshot, Submission};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Fields requested for every submission.
const SUBMISSION_FIELDS: &str =
    "id datasetId workflowId status inputFile inputFilename resultFile retrieved errors";

/// Prefix of storage URIs returned by the service.
const STORAGE_SCHEME: &str = "indico-file:///";

pub const WORKFLOW_URL_SUBMISSION: &str = r"
mutation WorkflowUrlSubmission($workflowId: Int!, $urls: [String]!) {
  workflowUrlSubmission(workflowId: $workflowId, urls: $urls) {
    submissionIds
  }
}";

pub const WORKFLOW_SUBMISSION: &str = r"
mutation WorkflowSubmission($workflowId: Int!, $files: [FileInput]!) {
  workflowSubmission(workflowId: $workflowId, files: $files) {
    submissionIds
  }
}";

pub const SUBMIT_AUTO_REVIEW: &str = r"
mutation SubmitAutoReview($submissionId: Int!, $changes: JSONString, $rejected: Boolean, $forceComplete: Boolean) {
  submitAutoReview(submissionId: $submissionId, changes: $changes, rejected: $rejected, forceComplete: $forceComplete) {
    jobId
  }
}";

pub const JOB: &str = r"
query Job($id: String) {
  job(id: $id) {
    id
    status
    ready
    result
  }
}";

pub fn list_submissions_query() -> String {
    format!(
        "query ListSubmissions($submissionIds: [Int], $workflowIds: [Int], $filters: SubmissionFilter, $limit: Int) {{\n  \
         submissions(submissionIds: $submissionIds, workflowIds: $workflowIds, filters: $filters, limit: $limit) {{\n    \
         submissions {{ {SUBMISSION_FIELDS} }}\n  }}\n}}"
    )
}

pub fn submission_query() -> String {
    format!(
        "query GetSubmission($submissionId: Int!) {{\n  submission(id: $submissionId) {{ {SUBMISSION_FIELDS} }}\n}}"
    )
}

// ============================================================================
// Variables
// ============================================================================

pub fn list_variables(query: &ListQuery) -> Value {
    let filters = if query.filter.is_empty() {
        Value::Null
    } else {
        json!(query.filter)
    };
    json!({
        "submissionIds": query.submission_ids,
        "workflowIds": query.workflow_ids,
        "filters": filters,
        "limit": query.limit,
    })
}

/// Review variables. `forceComplete` is left out entirely when absent, since
/// the service treats a missing flag differently from `false`.
pub fn review_variables(review: &ReviewRequest) -> Result<Value> {
    let mut variables = Map::new();
    variables.insert("submissionId".into(), json!(review.submission_id));
    variables.insert("rejected".into(), json!(review.rejected));
    if let Some(changes) = &review.changes {
        variables.insert("changes".into(), Value::String(serde_json::to_string(changes)?));
    }
    if let Some(force) = review.force_complete {
        variables.insert("forceComplete".into(), json!(force));
    }
    Ok(Value::Object(variables))
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Extracts `data` from a GraphQL response body, turning `errors` into a
/// remote failure.
pub fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    let response: GraphQlResponse<T> = serde_json::from_value(body)
        .map_err(|e| ConnectorError::remote(format!("Unexpected GraphQL response: {e}")))?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(ConnectorError::remote(messages.join("; ")));
    }

    response
        .data
        .ok_or_else(|| ConnectorError::remote("GraphQL response carried no data"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionIds {
    pub submission_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUrlSubmissionData {
    pub workflow_url_submission: SubmissionIds,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSubmissionData {
    pub workflow_submission: SubmissionIds,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionList {
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsData {
    pub submissions: SubmissionList,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionData {
    pub submission: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdField {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAutoReviewData {
    pub submit_auto_review: JobIdField,
}

#[derive(Debug, Deserialize)]
pub struct JobData {
    pub job: Option<Snapshot>,
}

/// Absolute storage path of a result file on the host.
pub fn storage_path(result_file: &str) -> String {
    let path = result_file.strip_prefix(STORAGE_SCHEME).unwrap_or(result_file);
    format!("/{}", path.trim_start_matches('/'))
}

/// The result file a submission row points at, if it has one yet.
pub fn result_file(row: &Snapshot) -> Option<&str> {
    row.get("resultFile")
        .and_then(Value::as_str)
        .filter(|file| !file.is_empty())
}

/// The downloaded result document, returned in place of the submission row.
///
/// The row's `status` is carried over when the document has none, so a wait
/// for a particular status still sees it.
pub fn result_document(row: &Snapshot, document: Snapshot) -> Snapshot {
    match (document, row.get("status")) {
        (Value::Object(mut fields), Some(status)) => {
            fields
                .entry("status")
                .or_insert_with(|| status.clone());
            Value::Object(fields)
        }
        (document, _) => document,
    }
}

/// Reshapes a raw job into `{id, status, ready, results}`.
///
/// The service sends the result as JSON text; it is decoded when possible and
/// only exposed once the job is ready.
pub fn job_snapshot(raw: Snapshot) -> Snapshot {
    let ready = raw.get("ready").and_then(Value::as_bool).unwrap_or(false);
    let results = match raw.get("result") {
        Some(Value::String(text)) if ready => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Some(other) if ready => other.clone(),
        _ => Value::Null,
    };

    json!({
        "id": raw.get("id").cloned().unwrap_or(Value::Null),
        "status": raw.get("status").cloned().unwrap_or(Value::Null),
        "ready": ready,
        "results": results,
    })
}

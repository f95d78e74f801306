//! Request and response values exchanged with the submissions service.
//!
//! Everything here is built per call and dropped when the call returns.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ConnectorError, Result};
use crate::status::SubmissionStatus;

/// Structured payload returned by a fetch-by-id call.
///
/// The connector only reads `status` and `results` from it; everything else is
/// passed through to the host untouched.
pub type Snapshot = Value;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of an asynchronous job created by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// Submission creation
// ============================================================================

/// Documents to submit to a workflow: local files or remote URLs, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionSources {
    /// Paths of local files to upload.
    Files(Vec<PathBuf>),
    /// URLs the service downloads the documents from.
    Urls(Vec<Url>),
}

impl SubmissionSources {
    /// Builds the source list from the two optional host arguments.
    ///
    /// Blank entries are ignored. Exactly one of the lists must contain
    /// something, and every URL must be absolute.
    pub fn from_args(filepaths: Option<&[String]>, uris: Option<&[String]>) -> Result<Self> {
        let filepaths = non_blank_entries(filepaths);
        let uris = non_blank_entries(uris);

        match (filepaths.is_empty(), uris.is_empty()) {
            (true, true) => Err(ConnectorError::validation(
                "No uris or filepaths provided.",
            )),
            (false, false) => Err(ConnectorError::validation(
                "Provided uris and filepaths. Pass only one of the parameters.",
            )),
            (false, true) => Ok(Self::Files(
                filepaths.into_iter().map(PathBuf::from).collect(),
            )),
            (true, false) => uris
                .into_iter()
                .map(|uri| {
                    Url::parse(uri).map_err(|e| {
                        ConnectorError::validation(format!("Invalid uri '{uri}': {e}"))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Urls),
        }
    }

    /// Number of documents in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Files(files) => files.len(),
            Self::Urls(urls) => urls.len(),
        }
    }

    /// Returns `true` if the list holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn non_blank_entries(entries: Option<&[String]>) -> Vec<&str> {
    entries
        .unwrap_or_default()
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .collect()
}

// ============================================================================
// Submission listing
// ============================================================================

/// Constraints on a submission listing. Absent fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    /// Exact input file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_filename: Option<String>,
    /// Current lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubmissionStatus>,
    /// Whether the results were already retrieved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved: Option<bool>,
}

impl SubmissionFilter {
    /// Creates a filter, normalizing a blank file name to "absent".
    #[must_use]
    pub fn new(
        input_filename: Option<&str>,
        status: Option<SubmissionStatus>,
        retrieved: Option<bool>,
    ) -> Self {
        Self {
            input_filename: input_filename
                .filter(|name| !name.trim().is_empty())
                .map(ToString::to_string),
            status,
            retrieved,
        }
    }

    /// Returns `true` if no field constrains the listing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.input_filename.is_none() && self.status.is_none() && self.retrieved.is_none()
    }
}

/// A complete listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Restrict to these submission ids.
    pub submission_ids: Option<Vec<i64>>,
    /// Restrict to these workflows.
    pub workflow_ids: Option<Vec<i64>>,
    /// Field constraints.
    pub filter: SubmissionFilter,
    /// Maximum number of submissions to return.
    pub limit: u32,
}

impl ListQuery {
    /// Creates a query; empty id lists are treated as absent.
    #[must_use]
    pub fn new(
        submission_ids: Option<&[i64]>,
        workflow_ids: Option<&[i64]>,
        filter: SubmissionFilter,
        limit: u32,
    ) -> Self {
        let ids = |ids: Option<&[i64]>| ids.filter(|ids| !ids.is_empty()).map(<[i64]>::to_vec);
        Self {
            submission_ids: ids(submission_ids),
            workflow_ids: ids(workflow_ids),
            filter,
            limit,
        }
    }
}

/// A submission as reported by a listing.
///
/// The service sends camelCase keys; the host receives PascalCase keys with
/// the status as its canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "camelCase"))]
pub struct Submission {
    /// Submission id.
    pub id: i64,
    /// Dataset the workflow belongs to.
    #[serde(default)]
    pub dataset_id: Option<i64>,
    /// Workflow the submission was made to.
    #[serde(default)]
    pub workflow_id: Option<i64>,
    /// Current lifecycle status.
    pub status: SubmissionStatus,
    /// Storage location of the uploaded document.
    #[serde(default)]
    pub input_file: Option<String>,
    /// Original name of the uploaded document.
    #[serde(default)]
    pub input_filename: Option<String>,
    /// Storage location of the result document, once produced.
    #[serde(default)]
    pub result_file: Option<String>,
    /// Whether the results were marked as retrieved.
    #[serde(default)]
    pub retrieved: bool,
    /// Processing errors reported by the service.
    #[serde(default)]
    pub errors: Option<String>,
}

// ============================================================================
// Review
// ============================================================================

/// A review to submit for a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    /// Submission being reviewed.
    pub submission_id: i64,
    /// Corrected results, if the review accepts the submission.
    pub changes: Option<Value>,
    /// Whether the review rejects the submission.
    pub rejected: bool,
    /// Forwarded verbatim: the service treats "absent" and "false" differently.
    pub force_complete: Option<bool>,
}

impl ReviewRequest {
    /// Checks that the review either carries changes or rejects.
    pub fn validate(&self) -> Result<()> {
        if self.changes.is_none() && !self.rejected {
            return Err(ConnectorError::validation(
                "Must provide Changes or Reject=true",
            ));
        }
        Ok(())
    }
}

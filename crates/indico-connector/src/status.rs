//! Submission lifecycle vocabulary and the boundary token parsers.
//!
//! The host passes every argument as text. [`SubmissionStatus`] is the closed
//! set of lifecycle states the service reports. It always crosses the boundary
//! as its canonical upper-case name and never as a numeric code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// Lifecycle state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    /// The workflow is still processing the document.
    Processing,
    /// Waiting for auto review.
    PendingAutoReview,
    /// Waiting for a reviewer.
    PendingReview,
    /// Waiting for an administrator (exception queue).
    PendingAdminReview,
    /// Processing finished and results are available.
    Complete,
    /// Processing failed.
    Failed,
    /// Results were retrieved by a client.
    Retrieved,
}

impl SubmissionStatus {
    /// Every member, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Processing,
        Self::PendingAutoReview,
        Self::PendingReview,
        Self::PendingAdminReview,
        Self::Complete,
        Self::Failed,
        Self::Retrieved,
    ];

    /// Returns the canonical wire name (e.g. `PENDING_REVIEW`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::PendingAutoReview => "PENDING_AUTO_REVIEW",
            Self::PendingReview => "PENDING_REVIEW",
            Self::PendingAdminReview => "PENDING_ADMIN_REVIEW",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Retrieved => "RETRIEVED",
        }
    }

    /// Parses a status name, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_case_insensitive(s.trim()).ok_or_else(|| {
            ConnectorError::validation(
                "Wrong status value provided. Please provide one of the valid submission statuses.",
            )
        })
    }
}

impl<'de> Deserialize<'de> for SubmissionStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid submission status '{s}'"))
        })
    }
}

impl Serialize for SubmissionStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Returns `None` for an absent or blank token.
fn non_blank(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}

/// Parses an optional status argument.
///
/// A blank or absent token means "no constraint" and yields `None`; any other
/// token must name a member of [`SubmissionStatus`].
///
/// # Examples
///
/// ```
/// use indico_connector::status::{parse_status, SubmissionStatus};
///
/// assert_eq!(parse_status(Some("complete")).unwrap(), Some(SubmissionStatus::Complete));
/// assert_eq!(parse_status(Some("  ")).unwrap(), None);
/// assert!(parse_status(Some("NOT_A_STATUS")).is_err());
/// ```
pub fn parse_status(token: Option<&str>) -> Result<Option<SubmissionStatus>> {
    non_blank(token)
        .map(str::parse::<SubmissionStatus>)
        .transpose()
}

/// Parses an optional boolean argument (`true`/`false`, any casing).
///
/// A blank or absent token yields `None`.
pub fn parse_bool(token: Option<&str>) -> Result<Option<bool>> {
    let Some(token) = non_blank(token) else {
        return Ok(None);
    };

    if token.eq_ignore_ascii_case("true") {
        Ok(Some(true))
    } else if token.eq_ignore_ascii_case("false") {
        Ok(Some(false))
    } else {
        Err(ConnectorError::validation(
            "Wrong retrieved value provided. Please provide \"True\" or \"False\" as a value.",
        ))
    }
}

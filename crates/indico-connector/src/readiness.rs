//! Decides whether a fetched snapshot lets polling stop.

use serde_json::Value;

use crate::model::Snapshot;
use crate::status::SubmissionStatus;

/// Returns `true` if polling may stop for this snapshot.
///
/// With a target status, the snapshot is ready exactly when its `status`
/// equals the target and no other field is consulted. Without one, it is
/// ready once it carries a non-empty `results` payload, whatever its status.
///
/// # Examples
///
/// ```
/// use indico_connector::readiness::is_ready;
/// use indico_connector::SubmissionStatus;
/// use serde_json::json;
///
/// let snapshot = json!({"status": "COMPLETE", "results": null});
/// assert!(is_ready(&snapshot, Some(SubmissionStatus::Complete)));
/// assert!(!is_ready(&snapshot, None));
/// ```
#[must_use]
pub fn is_ready(snapshot: &Snapshot, target: Option<SubmissionStatus>) -> bool {
    match target {
        Some(target) => snapshot_status(snapshot) == Some(target),
        None => has_results(snapshot),
    }
}

/// Reads the `status` field, if it names a known status.
#[must_use]
pub fn snapshot_status(snapshot: &Snapshot) -> Option<SubmissionStatus> {
    snapshot.get("status")?.as_str()?.parse().ok()
}

fn has_results(snapshot: &Snapshot) -> bool {
    match snapshot.get("results") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => true,
    }
}

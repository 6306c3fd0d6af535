//! Tracking job model.
//!
//! A [`TrackingJob`] is one aggregate unit of orchestrated work: "track all
//! keywords for user X". Its `progress` reflects completion of the many
//! keyword-level work items it spawned on the external queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// What kind of entity a job tracks ranks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Blog,
    Smartplace,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Blog => "blog",
            JobKind::Smartplace => "smartplace",
        }
    }
}

/// Lifecycle state of a tracking job.
///
/// `Processing` specifically means "handed off to external workers, awaiting
/// their callbacks", while `Running` is local work in progress. Jobs with no
/// external handoff may skip straight from `Running` to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Position in the lifecycle partial order. Terminal states share the
    /// highest rank; the tracker refuses updates that would lower it.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Processing => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Work-item completion counters for an aggregate job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(current: u32, total: u32) -> Self {
        // `current <= total` holds once the total is known; a zero total
        // means the item count has not been reported yet.
        let current = if total > 0 { current.min(total) } else { current };
        Self { current, total }
    }
}

/// Error recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl JobFailure {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One aggregate unit of orchestrated tracking work.
///
/// Created at dispatch time, mutated only through `JobTracker` update
/// operations, retained in memory for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: Progress,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
}

/// Input for creating a tracking job.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewJob {
    pub owner_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
    pub kind: JobKind,
    /// Initial status; `Queued` unless the caller starts local work directly.
    #[builder(default = JobStatus::Queued)]
    pub status: JobStatus,
    /// Number of work items the aggregate job spawns, if already known.
    #[builder(default)]
    pub total: u32,
}

/// Partial update applied to a stored job.
///
/// Unset fields are left untouched.
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option)))]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<Progress>,
    pub error: Option<JobFailure>,
    pub results: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rank_is_monotonic_along_lifecycle() {
        assert!(JobStatus::Queued.rank() < JobStatus::Running.rank());
        assert!(JobStatus::Running.rank() < JobStatus::Processing.rank());
        assert!(JobStatus::Processing.rank() < JobStatus::Completed.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn progress_clamps_current_once_total_known() {
        let p = Progress::new(12, 10);
        assert_eq!(p.current, 10);

        // Unknown total: current passes through
        let p = Progress::new(3, 0);
        assert_eq!(p.current, 3);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(serde_json::to_string(&JobKind::Blog).unwrap(), "\"blog\"");
    }
}

//! In-process registry of tracking jobs.
//!
//! `JobTracker` is the single source of truth for "what is running now". It
//! is intentionally a passive data structure: every externally observable
//! mutation should be followed by an event published on the caller's side,
//! so each call site can choose its own payload shape.
//!
//! Jobs are not persisted; they vanish on restart. That is an explicit
//! design choice - the registry backs a dashboard-only status view.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::job::{JobPatch, NewJob, Progress, TrackingJob};

/// Default cap on retained jobs before the oldest terminal entries are
/// evicted.
const DEFAULT_MAX_JOBS: usize = 500;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid job: {0}")]
    InvalidJob(String),
}

/// Mutex-protected job registry.
///
/// Multiple stream connections and multiple job-update call sites touch this
/// concurrently; all reads copy data out before the lock is released, so no
/// caller ever awaits while holding it.
pub struct JobTracker {
    jobs: RwLock<HashMap<Uuid, TrackingJob>>,
    max_jobs: usize,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::with_max_jobs(DEFAULT_MAX_JOBS)
    }

    pub fn with_max_jobs(max_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_jobs,
        }
    }

    /// Register a new job and return it with its assigned id.
    ///
    /// Fails only on invalid input; owner fields are required for display on
    /// the dashboard.
    pub fn add_job(&self, new: NewJob) -> Result<TrackingJob, TrackerError> {
        if new.owner_name.trim().is_empty() {
            return Err(TrackerError::InvalidJob("owner_name is required".into()));
        }
        if new.owner_email.trim().is_empty() {
            return Err(TrackerError::InvalidJob("owner_email is required".into()));
        }

        let job = TrackingJob {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            owner_name: new.owner_name,
            owner_email: new.owner_email,
            kind: new.kind,
            status: new.status,
            progress: Progress::new(0, new.total),
            started_at: chrono::Utc::now(),
            completed_at: None,
            error: None,
            results: None,
        };

        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(job.id, job.clone());
        if jobs.len() > self.max_jobs {
            evict_oldest(&mut jobs, self.max_jobs);
        }

        Ok(job)
    }

    /// Merge a partial update into a stored job.
    ///
    /// Entering a terminal status stamps `completed_at`. A status change that
    /// would move a job down the lifecycle order, or flip one terminal state
    /// into the other, is refused (the rest of the patch still applies).
    /// Unknown ids are logged and ignored - the aggregate job may have been
    /// evicted, or the id may come from a stale client.
    pub fn update_job(&self, job_id: Uuid, patch: JobPatch) -> Option<TrackingJob> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let Some(job) = jobs.get_mut(&job_id) else {
            warn!(job_id = %job_id, "update for unknown tracking job ignored");
            return None;
        };

        if let Some(status) = patch.status {
            let regression = status.rank() < job.status.rank()
                || (job.status.is_terminal() && status != job.status);
            if regression {
                warn!(
                    job_id = %job_id,
                    from = ?job.status,
                    to = ?status,
                    "refusing backward status transition"
                );
            } else {
                job.status = status;
                if status.is_terminal() && job.completed_at.is_none() {
                    job.completed_at = Some(chrono::Utc::now());
                }
            }
        }
        if let Some(progress) = patch.progress {
            job.progress = Progress::new(progress.current, progress.total);
        }
        if let Some(error) = patch.error {
            job.error = Some(error);
        }
        if let Some(results) = patch.results {
            job.results = Some(results);
        }

        Some(job.clone())
    }

    /// Convenience wrapper over `update_job` for progress reporting.
    pub fn update_progress(
        &self,
        job_id: Uuid,
        current: u32,
        total: u32,
    ) -> Option<TrackingJob> {
        self.update_job(
            job_id,
            JobPatch::builder()
                .progress(Progress::new(current, total))
                .build(),
        )
    }

    /// Append one keyword-level result to the job's result list.
    ///
    /// Accumulation lives here so no caller read-modify-writes a job outside
    /// the tracker's entry points.
    pub fn append_result(&self, job_id: Uuid, result: serde_json::Value) -> Option<TrackingJob> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let Some(job) = jobs.get_mut(&job_id) else {
            warn!(job_id = %job_id, "result for unknown tracking job ignored");
            return None;
        };

        match job.results.as_mut().and_then(|r| r.as_array_mut()) {
            Some(list) => list.push(result),
            None => job.results = Some(serde_json::Value::Array(vec![result])),
        }

        Some(job.clone())
    }

    pub fn get_job(&self, job_id: Uuid) -> Option<TrackingJob> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&job_id)
            .cloned()
    }

    /// Snapshot of all retained jobs, oldest first.
    ///
    /// Used for the "initial state" frame sent to newly connected observers.
    pub fn all_jobs(&self) -> Vec<TrackingJob> {
        let mut jobs: Vec<TrackingJob> = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop the oldest terminal jobs until the registry fits the cap; if every
/// job is still live, drop the oldest outright.
fn evict_oldest(jobs: &mut HashMap<Uuid, TrackingJob>, max_jobs: usize) {
    while jobs.len() > max_jobs {
        let victim = jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .min_by_key(|j| (j.completed_at.unwrap_or(j.started_at), j.id))
            .or_else(|| jobs.values().min_by_key(|j| (j.started_at, j.id)))
            .map(|j| j.id);

        match victim {
            Some(id) => {
                jobs.remove(&id);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::tracking::job::{JobKind, JobStatus};

    fn sample_job() -> NewJob {
        NewJob::builder()
            .owner_id(Uuid::new_v4())
            .owner_name("Kim Marketing")
            .owner_email("kim@example.com")
            .kind(JobKind::Blog)
            .total(20u32)
            .build()
    }

    #[test]
    fn add_job_assigns_id_and_initial_state() {
        let tracker = JobTracker::new();
        let job = tracker.add_job(sample_job()).unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, Progress { current: 0, total: 20 });
        assert!(job.completed_at.is_none());
        assert_eq!(tracker.get_job(job.id).unwrap().id, job.id);
    }

    #[test]
    fn add_job_rejects_missing_owner_fields() {
        let tracker = JobTracker::new();
        let new = NewJob::builder()
            .owner_id(Uuid::new_v4())
            .owner_name("")
            .owner_email("kim@example.com")
            .kind(JobKind::Blog)
            .build();

        assert!(tracker.add_job(new).is_err());
    }

    #[test]
    fn update_sets_completed_at_on_terminal_transition() {
        let tracker = JobTracker::new();
        let job = tracker.add_job(sample_job()).unwrap();

        let updated = tracker
            .update_job(job.id, JobPatch::builder().status(JobStatus::Completed).build())
            .unwrap();

        assert_eq!(updated.status, JobStatus::Completed);
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn status_never_moves_backward_from_terminal() {
        let tracker = JobTracker::new();
        let job = tracker.add_job(sample_job()).unwrap();

        for status in [
            JobStatus::Running,
            JobStatus::Processing,
            JobStatus::Failed,
            // attempts to leave the terminal state must be refused
            JobStatus::Running,
            JobStatus::Queued,
            JobStatus::Completed,
        ] {
            tracker.update_job(job.id, JobPatch::builder().status(status).build());
        }

        assert_eq!(tracker.get_job(job.id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn status_never_moves_down_the_lifecycle_order() {
        let tracker = JobTracker::new();
        let job = tracker.add_job(sample_job()).unwrap();
        tracker.update_job(
            job.id,
            JobPatch::builder().status(JobStatus::Processing).build(),
        );

        for status in [JobStatus::Running, JobStatus::Queued] {
            tracker.update_job(job.id, JobPatch::builder().status(status).build());
        }

        assert_eq!(
            tracker.get_job(job.id).unwrap().status,
            JobStatus::Processing
        );
    }

    #[test]
    fn update_unknown_job_is_a_logged_noop() {
        let tracker = JobTracker::new();
        assert!(tracker
            .update_job(Uuid::new_v4(), JobPatch::builder().status(JobStatus::Running).build())
            .is_none());
    }

    #[test]
    fn update_progress_clamps_to_total() {
        let tracker = JobTracker::new();
        let job = tracker.add_job(sample_job()).unwrap();

        let updated = tracker.update_progress(job.id, 25, 20).unwrap();
        assert_eq!(updated.progress, Progress { current: 20, total: 20 });
    }

    #[test]
    fn append_result_accumulates_a_list() {
        let tracker = JobTracker::new();
        let job = tracker.add_job(sample_job()).unwrap();

        tracker.append_result(job.id, serde_json::json!({"keyword": "a"}));
        let updated = tracker
            .append_result(job.id, serde_json::json!({"keyword": "b"}))
            .unwrap();

        assert_eq!(updated.results.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn all_jobs_is_ordered_by_start_time() {
        let tracker = JobTracker::new();
        let first = tracker.add_job(sample_job()).unwrap();
        let second = tracker.add_job(sample_job()).unwrap();

        let ids: Vec<Uuid> = tracker.all_jobs().iter().map(|j| j.id).collect();
        let first_pos = ids.iter().position(|id| *id == first.id).unwrap();
        let second_pos = ids.iter().position(|id| *id == second.id).unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn eviction_prefers_oldest_terminal_jobs() {
        let tracker = JobTracker::with_max_jobs(2);
        let done = tracker.add_job(sample_job()).unwrap();
        tracker.update_job(done.id, JobPatch::builder().status(JobStatus::Completed).build());
        let live_a = tracker.add_job(sample_job()).unwrap();
        let live_b = tracker.add_job(sample_job()).unwrap();

        assert_eq!(tracker.len(), 2);
        assert!(tracker.get_job(done.id).is_none());
        assert!(tracker.get_job(live_a.id).is_some());
        assert!(tracker.get_job(live_b.id).is_some());
    }
}

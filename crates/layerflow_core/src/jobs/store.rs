//! In-memory table of render jobs.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::models::{RenderJob, RenderStatus};

/// Render job records keyed by job id.
///
/// Every access is a single map operation under one lock.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<String, RenderJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job, replacing any record with the same id.
    pub fn insert(&self, job: RenderJob) {
        self.jobs.lock().insert(job.job_id.clone(), job);
    }

    /// Copy of the job with `job_id`.
    pub fn get(&self, job_id: &str) -> Option<RenderJob> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Apply `f` to the job with `job_id`; `None` if unknown.
    pub fn update<T>(&self, job_id: &str, f: impl FnOnce(&mut RenderJob) -> T) -> Option<T> {
        self.jobs.lock().get_mut(job_id).map(f)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    pub fn count_with_status(&self, status: RenderStatus) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|job| job.status == status)
            .count()
    }

    /// All jobs, oldest submission first.
    pub fn list(&self) -> Vec<RenderJob> {
        let mut jobs: Vec<RenderJob> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// Drop terminal jobs that finished more than `older_than` ago.
    ///
    /// Returns the number of records removed.
    pub fn prune_finished(&self, older_than: Duration) -> usize {
        let Ok(age) = chrono::Duration::from_std(older_than) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            return 0;
        };

        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.is_some_and(|done| done < cutoff))
        });
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = jobs.len(), "Pruned finished jobs");
        }
        removed
    }
}

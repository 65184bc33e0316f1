//! Render job records and the status view served to pollers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a render job.
///
/// `Complete` is the only success spelling, serialized as `"complete"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Queued,
    Rendering,
    Complete,
    Failed,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Queued => "queued",
            RenderStatus::Rendering => "rendering",
            RenderStatus::Complete => "complete",
            RenderStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStatus::Complete | RenderStatus::Failed)
    }

    /// Whether `next` is a legal forward step from this state.
    pub fn can_transition_to(&self, next: RenderStatus) -> bool {
        matches!(
            (self, next),
            (RenderStatus::Queued, RenderStatus::Rendering)
                | (RenderStatus::Rendering, RenderStatus::Complete)
                | (RenderStatus::Rendering, RenderStatus::Failed)
        )
    }
}

impl std::fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted to move a job backwards or out of a terminal state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job '{job_id}' cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub job_id: String,
    pub from: RenderStatus,
    pub to: RenderStatus,
}

/// Tracked lifecycle record for one render request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub job_id: String,
    /// Detection the render was requested for.
    pub detection_id: String,
    pub status: RenderStatus,
    /// 0-100.
    pub progress: u8,
    /// Jobs ahead of this one at submission (0 = started immediately).
    pub queue_position: usize,
    /// When the job was accepted.
    pub started_at: DateTime<Utc>,
    /// When the renderer was launched for this job.
    pub render_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub video_location: Option<PathBuf>,
    pub error_detail: Option<String>,
}

impl RenderJob {
    /// Create a job in its initial state.
    ///
    /// Only `Queued` and `Rendering` are valid initial states.
    pub fn new(
        job_id: impl Into<String>,
        detection_id: impl Into<String>,
        initial: RenderStatus,
        queue_position: usize,
    ) -> Self {
        let now = Utc::now();
        let initial = if initial == RenderStatus::Rendering {
            RenderStatus::Rendering
        } else {
            RenderStatus::Queued
        };
        Self {
            job_id: job_id.into(),
            detection_id: detection_id.into(),
            status: initial,
            progress: 0,
            queue_position,
            started_at: now,
            render_started_at: (initial == RenderStatus::Rendering).then_some(now),
            completed_at: None,
            video_location: None,
            error_detail: None,
        }
    }

    /// Move to `Rendering`. A job created already rendering is left as is.
    pub fn mark_rendering(&mut self) -> Result<(), InvalidTransition> {
        if self.status == RenderStatus::Rendering {
            return Ok(());
        }
        self.transition(RenderStatus::Rendering)?;
        self.render_started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `Complete` with the produced video.
    pub fn mark_complete(&mut self, video_location: PathBuf) -> Result<(), InvalidTransition> {
        self.transition(RenderStatus::Complete)?;
        self.progress = 100;
        self.video_location = Some(video_location);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `Failed` with a diagnostic.
    pub fn mark_failed(&mut self, detail: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(RenderStatus::Failed)?;
        self.error_detail = Some(detail.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Record renderer progress. Ignored unless rendering; never reaches 100
    /// before completion and never goes backwards.
    pub fn set_progress(&mut self, percent: u8) {
        if self.status != RenderStatus::Rendering {
            return;
        }
        self.progress = self.progress.max(percent.min(99));
    }

    fn transition(&mut self, next: RenderStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Snapshot for polling clients.
    pub fn report(&self) -> JobStatusReport {
        JobStatusReport {
            job_id: self.job_id.clone(),
            status: self.status,
            progress: self.progress,
            queue_position: self.queue_position,
            video_location: self.video_location.clone(),
            error_detail: self.error_detail.clone(),
            started_at: self.started_at,
            render_started_at: self.render_started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Status query result produced for pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: RenderStatus,
    pub progress: u8,
    pub queue_position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_location: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

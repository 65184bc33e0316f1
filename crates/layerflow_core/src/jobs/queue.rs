//! FIFO render queue with a single active slot.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::{AnimationConfig, RenderStatus};

/// One accepted render request waiting for the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub job_id: String,
    pub detection_id: String,
    pub animations: AnimationConfig,
}

/// Point-in-time classification of a request at enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// `Rendering` when nothing was pending or active, otherwise `Queued`.
    pub status: RenderStatus,
    /// Requests ahead of this one, counting the active render.
    pub queue_position: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<RenderRequest>,
    /// Job id of the render in progress.
    active: Option<String>,
    closed: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }
}

/// Strict FIFO queue drained by exactly one worker.
#[derive(Debug, Default)]
pub struct RenderQueue {
    state: Mutex<QueueState>,
    /// Signalled when work arrives or the queue closes.
    available: Condvar,
    /// Signalled whenever a render finishes.
    finished: Condvar,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `request` and return its admission.
    ///
    /// `on_admit` runs under the queue lock before the worker can see the
    /// request, so a job record created there exists before it is dequeued.
    /// Returns `None` without calling `on_admit` once the queue is closed.
    pub fn enqueue(
        &self,
        request: RenderRequest,
        on_admit: impl FnOnce(&RenderRequest, Admission),
    ) -> Option<Admission> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        let admission = Admission {
            status: if state.is_idle() {
                RenderStatus::Rendering
            } else {
                RenderStatus::Queued
            },
            queue_position: state.pending.len() + usize::from(state.active.is_some()),
        };
        on_admit(&request, admission);
        state.pending.push_back(request);
        drop(state);

        self.available.notify_one();
        Some(admission)
    }

    /// Block until a request is available and mark it active.
    ///
    /// Returns `None` once the queue is closed.
    pub fn next(&self) -> Option<RenderRequest> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(request) = state.pending.pop_front() {
                state.active = Some(request.job_id.clone());
                return Some(request);
            }
            self.available.wait(&mut state);
        }
    }

    /// Release the active slot after a render reaches a terminal state.
    pub fn finish(&self, job_id: &str) {
        let mut state = self.state.lock();
        if state.active.as_deref() == Some(job_id) {
            state.active = None;
        } else {
            tracing::warn!(job_id, "Finished job was not the active render");
        }
        drop(state);
        self.finished.notify_all();
    }

    /// Stop handing out work. The active render is not interrupted.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
        self.finished.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn active_job(&self) -> Option<String> {
        self.state.lock().active.clone()
    }

    /// Wait until nothing is pending or active. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.is_idle() {
            if self.finished.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        true
    }
}

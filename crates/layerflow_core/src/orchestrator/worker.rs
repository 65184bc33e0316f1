//! The single background worker draining the render queue.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::jobs::RenderQueue;

use super::processor::RenderProcessor;

/// Handle to the worker thread.
pub struct RenderWorker {
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Start the worker. It runs until the queue is closed.
    pub fn spawn(queue: Arc<RenderQueue>, processor: Arc<RenderProcessor>) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || run(&queue, &processor))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the worker to exit. The queue must be closed first.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Render worker exited with a panic");
            }
        }
    }
}

fn run(queue: &RenderQueue, processor: &RenderProcessor) {
    tracing::debug!("Render worker started");
    while let Some(request) = queue.next() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&request)));
        match outcome {
            Ok(result) if result.success => {
                tracing::info!(job_id = %result.job_id, "Job finished");
            }
            Ok(result) => {
                tracing::info!(
                    job_id = %result.job_id,
                    error = result.error.as_deref().unwrap_or(""),
                    "Job failed"
                );
            }
            Err(_) => {
                processor.record_failure(&request.job_id, "Render worker panicked");
            }
        }
        queue.finish(&request.job_id);
    }
    tracing::debug!("Render worker stopped");
}

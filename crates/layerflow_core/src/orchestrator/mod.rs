//! Render job orchestration.
//!
//! This module provides:
//! - `RenderService`: submission, status polling, shutdown
//! - `RenderProcessor`: drives one job from staging to a terminal state
//! - `Renderer` / `SubprocessRenderer`: the external renderer capability
//! - `StagedFiles`: per-job transient inputs with guaranteed cleanup

mod errors;
mod processor;
mod renderer;
mod service;
mod staging;
mod worker;

pub use errors::{CleanupFailure, RenderError, RenderResult};
pub use processor::{JobResult, RenderProcessor};
pub use renderer::{parse_progress, ProgressSink, RenderInvocation, Renderer, SubprocessRenderer};
pub use service::RenderService;
pub use staging::{RenderProps, StagedFiles, StagingInputs};
pub use worker::RenderWorker;

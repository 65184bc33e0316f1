//! LayerFlow Core - Backend logic for LayerFlow
//!
//! This crate turns a captured page into ranked UI layers and serializes
//! video renders of those layers through a single-worker job queue.
//! It has zero UI dependencies and can be driven by an HTTP front end
//! or a CLI tool.

pub mod config;
pub mod detection;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod orchestrator;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Render job bookkeeping.
//!
//! This module provides:
//! - `JobStore`: in-memory table of `RenderJob` records
//! - `RenderQueue`: FIFO of pending requests with one active slot

mod queue;
mod store;

pub use queue::{Admission, RenderQueue, RenderRequest};
pub use store::JobStore;

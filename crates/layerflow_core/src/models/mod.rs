//! Data models for LayerFlow.
//!
//! This module contains the persisted shapes exchanged between detection,
//! the render queue, and polling clients:
//! - Layers and detection results
//! - Animation configuration
//! - Render job records and status reports

mod animation;
mod job;
mod layer;

pub use animation::{AnimationConfig, AnimationType, LayerAnimation};
pub use job::{InvalidTransition, JobStatusReport, RenderJob, RenderStatus};
pub use layer::{
    BoundingBox, DetectionMethod, DetectionResult, Dimensions, ElementType, Layer,
    LayerInvariantViolation,
};

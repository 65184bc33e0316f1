//! UI layer detection.
//!
//! Turns a queryable element tree into a ranked `DetectionResult`:
//! - `element` - element descriptors and the query capability
//! - `selector` - CSS subset used by the structural queries
//! - `snapshot` - JSON page captures as a query source
//! - `rules` - per-element heuristics as ordered rule tables
//! - `engine` - the detector itself
//! - `store` - persisted detections and screenshots

mod element;
mod engine;
mod errors;
pub mod rules;
mod selector;
mod snapshot;
mod store;

pub use element::{ComputedStyle, ElementDescriptor, ElementQuery, Rect};
pub use engine::{
    DetectionOptions, Device, LayerDetector, Viewport, STRUCTURAL_QUERIES,
};
pub use errors::{DetectResult, DetectionError};
pub use selector::{SelectorError, SelectorList};
pub use snapshot::DomSnapshot;
pub use store::DetectionStore;

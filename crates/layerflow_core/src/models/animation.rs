//! Per-layer animation configuration consumed by the external renderer.

use serde::{Deserialize, Serialize};

use super::layer::DetectionResult;

/// Animation applied to one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationType {
    PopOut,
    #[serde(rename = "rotate-360")]
    Rotate360,
    FadeIn,
    SlideIn,
    ScalePop,
}

impl AnimationType {
    pub const ALL: [AnimationType; 5] = [
        AnimationType::PopOut,
        AnimationType::Rotate360,
        AnimationType::FadeIn,
        AnimationType::SlideIn,
        AnimationType::ScalePop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationType::PopOut => "pop-out",
            AnimationType::Rotate360 => "rotate-360",
            AnimationType::FadeIn => "fade-in",
            AnimationType::SlideIn => "slide-in",
            AnimationType::ScalePop => "scale-pop",
        }
    }
}

impl std::fmt::Display for AnimationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment of an animation to a layer.
///
/// `layer_id` is a position in `DetectionResult::layers`, not a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerAnimation {
    pub layer_id: usize,
    #[serde(rename = "type")]
    pub kind: AnimationType,
    /// Start offset in frames.
    pub delay: u32,
    /// Length in frames, must be positive.
    pub duration: u32,
}

/// Full animation assignment for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub animations: Vec<LayerAnimation>,
}

impl AnimationConfig {
    /// Check frame counts and layer references against `detection`.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self, detection: &DetectionResult) -> Result<(), String> {
        let layer_count = detection.layers.len();
        for (index, animation) in self.animations.iter().enumerate() {
            if animation.duration == 0 {
                return Err(format!("animation {} has zero duration", index));
            }
            if animation.layer_id >= layer_count {
                return Err(format!(
                    "animation {} references layer {} but the detection has {} layers",
                    index, animation.layer_id, layer_count
                ));
            }
        }
        Ok(())
    }
}

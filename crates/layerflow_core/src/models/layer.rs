//! Detected layers and detection results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a detected UI element.
///
/// The DOM heuristic only produces the first nine variants; the rest come
/// from the vision-based detector and are accepted so its results load too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Button,
    Card,
    NavBar,
    HeroImage,
    TextBlock,
    InputField,
    Header,
    Footer,
    Other,
    Icon,
    Avatar,
    Badge,
    Modal,
    Sidebar,
    Logo,
    Illustration,
    Chart,
    Table,
    ListItem,
    Tab,
    Dropdown,
    Toggle,
    Checkbox,
    Radio,
    Slider,
    ProgressBar,
    Tooltip,
    Notification,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Button => "button",
            ElementType::Card => "card",
            ElementType::NavBar => "nav_bar",
            ElementType::HeroImage => "hero_image",
            ElementType::TextBlock => "text_block",
            ElementType::InputField => "input_field",
            ElementType::Header => "header",
            ElementType::Footer => "footer",
            ElementType::Other => "other",
            ElementType::Icon => "icon",
            ElementType::Avatar => "avatar",
            ElementType::Badge => "badge",
            ElementType::Modal => "modal",
            ElementType::Sidebar => "sidebar",
            ElementType::Logo => "logo",
            ElementType::Illustration => "illustration",
            ElementType::Chart => "chart",
            ElementType::Table => "table",
            ElementType::ListItem => "list_item",
            ElementType::Tab => "tab",
            ElementType::Dropdown => "dropdown",
            ElementType::Toggle => "toggle",
            ElementType::Checkbox => "checkbox",
            ElementType::Radio => "radio",
            ElementType::Slider => "slider",
            ElementType::ProgressBar => "progress_bar",
            ElementType::Tooltip => "tooltip",
            ElementType::Notification => "notification",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer rectangle in source-coordinate pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pixel area, used as the secondary sort key.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One detected UI element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub element_type: ElementType,
    /// Short human-readable label.
    pub label: String,
    pub bounding_box: BoundingBox,
    /// Stacking estimate, 1 (background) to 10 (closest to viewer).
    pub z_depth: u8,
    pub is_interactive: bool,
}

/// Page or screenshot size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Which detector produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    #[default]
    DomExtraction,
    AiVision,
}

/// Output of one detection run.
///
/// Layer order is part of the contract: index 0 is the most salient layer,
/// and animation configs address layers by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub layers: Vec<Layer>,
    pub dimensions: Dimensions,
    /// Page address or capture source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub method: DetectionMethod,
}

/// A broken ordering, size, or uniqueness guarantee in a `DetectionResult`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerInvariantViolation {
    #[error("{count} layers exceed the cap of {max}")]
    TooManyLayers { count: usize, max: usize },

    #[error("layer {index} is smaller than {min}px")]
    TooSmall { index: usize, min: u32 },

    #[error("layers {first} and {second} share a bounding box")]
    DuplicateBox { first: usize, second: usize },

    #[error("layers {index} and {next} are out of order")]
    OutOfOrder { index: usize, next: usize },
}

impl DetectionResult {
    /// Number of layers flagged interactive.
    pub fn interactive_count(&self) -> usize {
        self.layers.iter().filter(|l| l.is_interactive).count()
    }

    /// Verify the cap, exclusion, dedup, and sort guarantees.
    pub fn check_invariants(
        &self,
        max_layers: usize,
        min_size: u32,
    ) -> Result<(), LayerInvariantViolation> {
        if self.layers.len() > max_layers {
            return Err(LayerInvariantViolation::TooManyLayers {
                count: self.layers.len(),
                max: max_layers,
            });
        }

        let mut seen: HashSet<BoundingBox> = HashSet::with_capacity(self.layers.len());
        for (index, layer) in self.layers.iter().enumerate() {
            let bbox = layer.bounding_box;
            if bbox.width < min_size || bbox.height < min_size {
                return Err(LayerInvariantViolation::TooSmall {
                    index,
                    min: min_size,
                });
            }
            if !seen.insert(bbox) {
                let first = self
                    .layers
                    .iter()
                    .position(|l| l.bounding_box == bbox)
                    .unwrap_or(0);
                return Err(LayerInvariantViolation::DuplicateBox {
                    first,
                    second: index,
                });
            }
        }

        for (index, pair) in self.layers.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            let ordered = a.z_depth > b.z_depth
                || (a.z_depth == b.z_depth && a.bounding_box.area() >= b.bounding_box.area());
            if !ordered {
                return Err(LayerInvariantViolation::OutOfOrder {
                    index,
                    next: index + 1,
                });
            }
        }

        Ok(())
    }
}

//! Layer detection over an element-query source.
//!
//! The detector walks a fixed, priority-ordered list of structural queries,
//! filters and deduplicates the matches, then ranks them by depth and area.
//! Query order doubles as the tie-break for duplicate boxes: the first
//! query to reach a box decides its classification.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DetectionSettings;
use crate::models::{BoundingBox, DetectionMethod, DetectionResult, Dimensions, Layer};

use super::element::{ElementDescriptor, ElementQuery};
use super::errors::DetectResult;
use super::rules;
use super::DetectionError;

/// Structural queries in priority order.
pub const STRUCTURAL_QUERIES: [&str; 9] = [
    r#"button, [role="button"], .btn, .button"#,
    "a[href]",
    r#"input:not([type="hidden"]), textarea, select"#,
    "nav, header, footer",
    "img[src]",
    ".card, article",
    "section",
    r#"div[class*="container"]"#,
    "h1, h2, h3",
];

/// Visible page area in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn desktop() -> Self {
        Self::new(1440, 900)
    }

    pub fn mobile() -> Self {
        Self::new(390, 844)
    }

    /// Preset for `device` as configured.
    pub fn for_device(device: Device, settings: &DetectionSettings) -> Self {
        match device {
            Device::Desktop => Self::new(settings.desktop_width, settings.desktop_height),
            Device::Mobile => Self::new(settings.mobile_width, settings.mobile_height),
        }
    }
}

impl From<Viewport> for Dimensions {
    fn from(viewport: Viewport) -> Self {
        Dimensions {
            width: viewport.width,
            height: viewport.height,
        }
    }
}

/// Device class a page was captured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
}

impl FromStr for Device {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Device::Desktop),
            "mobile" => Ok(Device::Mobile),
            other => Err(DetectionError::invalid_input(format!(
                "unknown device '{}', expected desktop or mobile",
                other
            ))),
        }
    }
}

/// Tunables for a detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOptions {
    /// Elements narrower or shorter than this are dropped.
    pub min_element_size: f64,
    pub max_layers: usize,
    pub label_max_chars: usize,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            min_element_size: 20.0,
            max_layers: 25,
            label_max_chars: 60,
        }
    }
}

impl From<&DetectionSettings> for DetectionOptions {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            min_element_size: settings.min_element_size,
            max_layers: settings.max_layers,
            label_max_chars: settings.label_max_chars,
        }
    }
}

/// Heuristic DOM layer detector.
#[derive(Debug, Clone, Default)]
pub struct LayerDetector {
    options: DetectionOptions,
}

impl LayerDetector {
    pub fn new(options: DetectionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    /// Run every structural query against `source` and rank the results.
    ///
    /// A page with no qualifying elements yields an empty layer list.
    pub fn detect<Q>(
        &self,
        source: &Q,
        viewport: Viewport,
        url: Option<String>,
    ) -> DetectResult<DetectionResult>
    where
        Q: ElementQuery + ?Sized,
    {
        let viewport_height = f64::from(viewport.height);
        let mut seen: HashSet<BoundingBox> = HashSet::new();
        let mut layers = Vec::new();

        for query in STRUCTURAL_QUERIES {
            let matches = source.query_selector_all(query)?;
            let mut kept = 0usize;
            for element in &matches {
                if !rules::should_include(element, self.options.min_element_size, viewport_height)
                {
                    continue;
                }
                let bounding_box = rounded_box(element);
                if !seen.insert(bounding_box) {
                    continue;
                }
                layers.push(self.layer_for(element, bounding_box));
                kept += 1;
            }
            tracing::trace!(query, matched = matches.len(), kept, "Structural query");
        }

        let candidates = layers.len();
        // Stable: equal depth and area keep discovery order.
        layers.sort_by(|a, b| {
            b.z_depth
                .cmp(&a.z_depth)
                .then_with(|| b.bounding_box.area().cmp(&a.bounding_box.area()))
        });
        layers.truncate(self.options.max_layers);

        tracing::debug!(
            candidates,
            emitted = layers.len(),
            width = viewport.width,
            height = viewport.height,
            "Detected layers"
        );

        Ok(DetectionResult {
            layers,
            dimensions: viewport.into(),
            url,
            method: DetectionMethod::DomExtraction,
        })
    }

    fn layer_for(&self, element: &ElementDescriptor, bounding_box: BoundingBox) -> Layer {
        let (element_type, rule) = rules::classify(element);
        tracing::trace!(tag = %element.tag, rule, "Classified {}", element_type);

        Layer {
            element_type,
            label: rules::label(element, self.options.label_max_chars),
            bounding_box,
            z_depth: rules::z_depth(element),
            is_interactive: rules::is_interactive(element),
        }
    }
}

/// Round half up, matching browser `Math.round`.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn rounded_box(element: &ElementDescriptor) -> BoundingBox {
    let rect = &element.rect;
    BoundingBox::new(
        round_half_up(rect.left) as i32,
        round_half_up(rect.top) as i32,
        round_half_up(rect.width).max(0.0) as u32,
        round_half_up(rect.height).max(0.0) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::element::{ComputedStyle, Rect};
    use crate::detection::snapshot::DomSnapshot;
    use crate::models::ElementType;

    fn el(tag: &str, left: f64, top: f64, width: f64, height: f64) -> ElementDescriptor {
        ElementDescriptor::new(tag, Rect::new(left, top, width, height))
    }

    fn detect(elements: Vec<ElementDescriptor>) -> DetectionResult {
        LayerDetector::default()
            .detect(&DomSnapshot::new(elements), Viewport::desktop(), None)
            .unwrap()
    }

    #[test]
    fn duplicate_box_keeps_first_query_classification() {
        let result = detect(vec![
            el("div", 100.0, 100.0, 200.0, 50.0).with_attr("class", "hero-container"),
            el("button", 100.2, 99.8, 200.0, 50.0).with_text("Sign up"),
        ]);
        assert_eq!(result.layers.len(), 1);
        assert_eq!(result.layers[0].element_type, ElementType::Button);
        assert_eq!(result.layers[0].label, "Sign up");
        assert_eq!(result.layers[0].bounding_box, BoundingBox::new(100, 100, 200, 50));
    }

    #[test]
    fn mixed_case_container_classes_are_classified() {
        let result = detect(vec![
            el("div", 0.0, 100.0, 400.0, 300.0).with_attr("class", "ProductCard-container"),
            el("div", 0.0, 500.0, 200.0, 60.0).with_attr("class", "heroButton-container"),
        ]);
        let types: Vec<ElementType> = result.layers.iter().map(|l| l.element_type).collect();
        assert_eq!(types, vec![ElementType::Card, ElementType::Button]);
    }

    #[test]
    fn empty_page_yields_no_layers() {
        let result = detect(Vec::new());
        assert!(result.layers.is_empty());
        assert_eq!(result.dimensions, Dimensions { width: 1440, height: 900 });
        assert_eq!(result.method, DetectionMethod::DomExtraction);
    }

    #[test]
    fn excludes_small_hidden_and_offscreen_elements() {
        let mut hidden = ComputedStyle::default();
        hidden.display = "none".to_string();
        let result = detect(vec![
            el("button", 0.0, 0.0, 19.0, 40.0),
            el("button", 0.0, 50.0, 100.0, 40.0).with_style(hidden),
            el("section", 0.0, 2000.0, 1440.0, 600.0),
            el("h1", 0.0, 100.0, 600.0, 60.0).with_text("Welcome"),
        ]);
        assert_eq!(result.layers.len(), 1);
        assert_eq!(result.layers[0].element_type, ElementType::TextBlock);
        assert_eq!(result.layers[0].label, "Welcome");
    }

    #[test]
    fn sorts_by_depth_then_area() {
        let mut pinned = ComputedStyle::default();
        pinned.position = "fixed".to_string();
        let result = detect(vec![
            el("section", 0.0, 300.0, 1440.0, 500.0),
            el("img", 0.0, 100.0, 300.0, 200.0).with_attr("src", "a.png"),
            el("a", 10.0, 10.0, 60.0, 20.0).with_attr("href", "/"),
            el("button", 80.0, 10.0, 120.0, 40.0),
            el("header", 0.0, 0.0, 1440.0, 80.0).with_style(pinned),
        ]);
        let depths: Vec<u8> = result.layers.iter().map(|l| l.z_depth).collect();
        assert_eq!(depths, vec![10, 8, 8, 4, 3]);
        assert_eq!(result.layers[1].element_type, ElementType::Button);
        assert_eq!(result.layers[1].bounding_box.width, 120);
        assert!(result.check_invariants(25, 20).is_ok());
    }

    #[test]
    fn caps_at_max_layers() {
        let elements = (0..40u32)
            .map(|i| el("button", f64::from(i) * 30.0, 10.0, 25.0, 25.0))
            .collect();
        let result = detect(elements);
        assert_eq!(result.layers.len(), 25);
        assert!(result.check_invariants(25, 20).is_ok());
    }

    #[test]
    fn interactive_flags_and_labels() {
        let result = detect(vec![
            el("input", 0.0, 0.0, 200.0, 30.0).with_attr("placeholder", "Search"),
            el("input", 0.0, 40.0, 200.0, 30.0).with_attr("type", "hidden"),
            el("nav", 0.0, 100.0, 1440.0, 60.0),
        ]);
        assert_eq!(result.layers.len(), 2);
        assert_eq!(result.layers[0].label, "Search");
        assert!(result.layers[0].is_interactive);
        assert_eq!(result.layers[1].element_type, ElementType::NavBar);
        assert!(!result.layers[1].is_interactive);
        assert_eq!(result.interactive_count(), 1);
    }

    #[test]
    fn mobile_viewport_bounds_visibility() {
        let result = LayerDetector::default()
            .detect(
                &DomSnapshot::new(vec![el("footer", 0.0, 850.0, 390.0, 100.0)]),
                Viewport::mobile(),
                Some("https://example.com".to_string()),
            )
            .unwrap();
        assert!(result.layers.is_empty());
        assert_eq!(result.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn rounds_half_up_like_browsers() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(2.49), 2.0);
    }

    #[test]
    fn parses_device_names() {
        assert_eq!("Mobile".parse::<Device>().unwrap(), Device::Mobile);
        assert!("tablet".parse::<Device>().is_err());
        let settings = DetectionSettings::default();
        assert_eq!(Viewport::for_device(Device::Desktop, &settings), Viewport::desktop());
        assert_eq!(Viewport::for_device(Device::Mobile, &settings), Viewport::mobile());
    }
}

//! Captured page snapshots usable as an element-query source.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::element::{ElementDescriptor, ElementQuery};
use super::engine::Viewport;
use super::errors::DetectResult;
use super::selector::SelectorList;
use super::DetectionError;

/// Elements of a rendered page in document order, as captured by a browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    /// Page address the capture was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Viewport used during the capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
}

impl DomSnapshot {
    pub fn new(elements: Vec<ElementDescriptor>) -> Self {
        Self {
            url: None,
            viewport: None,
            elements,
        }
    }

    /// Parse a JSON capture. A malformed capture means no tree is available.
    pub fn from_json(json: &str) -> DetectResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DetectionError::unavailable(format!("malformed page capture: {}", e)))
    }

    pub fn from_path(path: &Path) -> DetectResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            DetectionError::unavailable(format!(
                "cannot read page capture {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }
}

impl ElementQuery for DomSnapshot {
    fn query_selector_all(&self, selector: &str) -> DetectResult<Vec<ElementDescriptor>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .elements
            .iter()
            .filter(|element| list.matches(element))
            .cloned()
            .collect())
    }
}

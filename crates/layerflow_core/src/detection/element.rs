//! Element descriptors and the element-query capability.
//!
//! A descriptor is everything the heuristics need to know about one element
//! of a rendered page: geometry, computed style, tag, attributes, and text.
//! Values mirror what a browser reports, so style properties stay strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::errors::DetectResult;

/// Bounding rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Subset of the computed style used by the heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyle {
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default = "default_opacity")]
    pub opacity: String,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_auto")]
    pub z_index: String,
    #[serde(default = "default_auto")]
    pub cursor: String,
}

fn default_display() -> String {
    "block".to_string()
}

fn default_visibility() -> String {
    "visible".to_string()
}

fn default_opacity() -> String {
    "1".to_string()
}

fn default_position() -> String {
    "static".to_string()
}

fn default_auto() -> String {
    "auto".to_string()
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: default_display(),
            visibility: default_visibility(),
            opacity: default_opacity(),
            position: default_position(),
            z_index: default_auto(),
            cursor: default_auto(),
        }
    }
}

impl ComputedStyle {
    /// Numeric stacking index; `auto` and garbage count as 0.
    pub fn z_index_value(&self) -> i64 {
        parse_leading_int(&self.z_index).unwrap_or(0)
    }

    /// Whether the element is fully transparent.
    pub fn is_transparent(&self) -> bool {
        self.opacity
            .trim()
            .parse::<f64>()
            .map(|o| o <= 0.0)
            .unwrap_or(false)
    }
}

/// Parse an optionally signed integer prefix, ignoring leading whitespace.
fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['-', '+']));
    let digits = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    trimmed[..sign_len + digits].parse().ok()
}

/// One element of a rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub tag: String,
    /// Keyed by lowercased attribute name.
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub attributes: BTreeMap<String, String>,
    pub rect: Rect,
    #[serde(default)]
    pub style: ComputedStyle,
    /// Rendered text content.
    #[serde(default)]
    pub inner_text: String,
    /// A script-attached click listener was observed.
    #[serde(default)]
    pub has_click_handler: bool,
}

/// Attribute names are case-insensitive in HTML.
fn lowercase_keys<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect())
}

impl ElementDescriptor {
    pub fn new(tag: impl Into<String>, rect: Rect) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            rect,
            style: ComputedStyle::default(),
            inner_text: String::new(),
            has_click_handler: false,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.inner_text = text.into();
        self
    }

    pub fn with_style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    /// Lowercased tag name.
    pub fn tag_name(&self) -> String {
        self.tag.to_ascii_lowercase()
    }

    pub fn is_tag(&self, name: &str) -> bool {
        self.tag.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn role(&self) -> Option<&str> {
        self.attr("role")
    }

    /// Raw `class` attribute, empty when absent.
    pub fn class_name(&self) -> &str {
        self.attr("class").unwrap_or("")
    }

    /// Whether the whitespace-separated class list contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.class_name().split_ascii_whitespace().any(|c| c == class)
    }

    /// Inline `onclick` or an observed listener.
    pub fn has_click_handler(&self) -> bool {
        self.has_click_handler || self.has_attr("onclick")
    }
}

/// Capability to query a live (or captured) document by CSS selector.
///
/// Implementations return matches in document order.
pub trait ElementQuery {
    fn query_selector_all(&self, selector: &str) -> DetectResult<Vec<ElementDescriptor>>;
}

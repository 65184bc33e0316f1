//! Per-element heuristics: visibility, inclusion, type, depth, label, and
//! interactivity.
//!
//! Classification and depth are ordered rule tables evaluated top to bottom;
//! the first rule whose predicate holds decides the outcome.

use crate::models::ElementType;

use super::element::ElementDescriptor;

/// Tags that never produce a layer.
pub const DENYLISTED_TAGS: [&str; 5] = ["script", "style", "noscript", "meta", "link"];

/// Tags that are interactive on their own.
pub const INTERACTIVE_TAGS: [&str; 5] = ["button", "a", "input", "textarea", "select"];

/// Depth used when no depth rule applies.
pub const DEFAULT_Z_DEPTH: u8 = 5;

/// Type used when no classification rule applies.
pub const DEFAULT_ELEMENT_TYPE: ElementType = ElementType::TextBlock;

/// One predicate/outcome pair in an ordered table.
pub struct Rule<T> {
    pub name: &'static str,
    pub applies: fn(&ElementDescriptor) -> bool,
    pub outcome: T,
}

/// First rule whose predicate holds for `element`.
pub fn first_rule<'r, T>(rules: &'r [Rule<T>], element: &ElementDescriptor) -> Option<&'r Rule<T>> {
    rules.iter().find(|rule| (rule.applies)(element))
}

/// Outcome of the first applicable rule, if any.
pub fn first_match<T: Copy>(rules: &[Rule<T>], element: &ElementDescriptor) -> Option<T> {
    first_rule(rules, element).map(|rule| rule.outcome)
}

/// Case-insensitive substring test on the raw class attribute.
fn class_contains(element: &ElementDescriptor, needle: &str) -> bool {
    element.class_name().to_ascii_lowercase().contains(needle)
}

fn role_is(element: &ElementDescriptor, role: &str) -> bool {
    element.role() == Some(role)
}

/// Element type precedence; anything unmatched is a text block.
pub static CLASSIFICATION_RULES: &[Rule<ElementType>] = &[
    Rule {
        name: "button signals",
        applies: |e| {
            e.is_tag("button")
                || role_is(e, "button")
                || class_contains(e, "button")
                || class_contains(e, "btn")
        },
        outcome: ElementType::Button,
    },
    Rule {
        name: "anchor",
        applies: |e| e.is_tag("a"),
        outcome: ElementType::Button,
    },
    Rule {
        name: "form control",
        applies: |e| e.is_tag("input") || e.is_tag("textarea") || e.is_tag("select"),
        outcome: ElementType::InputField,
    },
    Rule {
        name: "image",
        applies: |e| e.is_tag("img"),
        outcome: ElementType::HeroImage,
    },
    Rule {
        name: "navigation",
        applies: |e| e.is_tag("nav") || role_is(e, "navigation"),
        outcome: ElementType::NavBar,
    },
    Rule {
        name: "header",
        applies: |e| e.is_tag("header") || role_is(e, "banner"),
        outcome: ElementType::Header,
    },
    Rule {
        name: "footer",
        applies: |e| e.is_tag("footer") || role_is(e, "contentinfo"),
        outcome: ElementType::Footer,
    },
    Rule {
        name: "card container",
        applies: |e| class_contains(e, "card") || e.is_tag("article") || e.is_tag("section"),
        outcome: ElementType::Card,
    },
];

/// Depth precedence: positioning, then stacking index, then tag/role.
pub static DEPTH_RULES: &[Rule<u8>] = &[
    Rule {
        name: "pinned position",
        applies: |e| matches!(e.style.position.trim(), "fixed" | "sticky"),
        outcome: 10,
    },
    Rule {
        name: "z-index above 100",
        applies: |e| e.style.z_index_value() > 100,
        outcome: 9,
    },
    Rule {
        name: "z-index above 10",
        applies: |e| e.style.z_index_value() > 10,
        outcome: 8,
    },
    Rule {
        name: "positive z-index",
        applies: |e| e.style.z_index_value() > 0,
        outcome: 7,
    },
    Rule {
        name: "button or anchor",
        applies: |e| e.is_tag("button") || e.is_tag("a"),
        outcome: 8,
    },
    Rule {
        name: "text entry",
        applies: |e| e.is_tag("input") || e.is_tag("textarea"),
        outcome: 7,
    },
    Rule {
        name: "button role",
        applies: |e| role_is(e, "button"),
        outcome: 8,
    },
    Rule {
        name: "navigation landmark",
        applies: |e| e.is_tag("nav") || e.is_tag("header"),
        outcome: 6,
    },
    Rule {
        name: "image",
        applies: |e| e.is_tag("img"),
        outcome: 4,
    },
    Rule {
        name: "content section",
        applies: |e| e.is_tag("section") || e.is_tag("article"),
        outcome: 3,
    },
];

/// Element type and the name of the rule that decided it.
pub fn classify(element: &ElementDescriptor) -> (ElementType, &'static str) {
    first_rule(CLASSIFICATION_RULES, element)
        .map_or((DEFAULT_ELEMENT_TYPE, "default"), |rule| (rule.outcome, rule.name))
}

pub fn z_depth(element: &ElementDescriptor) -> u8 {
    first_match(DEPTH_RULES, element).unwrap_or(DEFAULT_Z_DEPTH)
}

/// Whether the element renders and overlaps the vertical viewport.
pub fn is_visible(element: &ElementDescriptor, viewport_height: f64) -> bool {
    let rect = &element.rect;
    let style = &element.style;
    rect.width > 0.0
        && rect.height > 0.0
        && style.display.trim() != "none"
        && style.visibility.trim() != "hidden"
        && !style.is_transparent()
        && rect.top < viewport_height
        && rect.bottom() > 0.0
}

/// Size, visibility, and tag filter applied before an element becomes a layer.
pub fn should_include(element: &ElementDescriptor, min_size: f64, viewport_height: f64) -> bool {
    if element.rect.width < min_size || element.rect.height < min_size {
        return false;
    }
    if !is_visible(element, viewport_height) {
        return false;
    }
    let tag = element.tag_name();
    !DENYLISTED_TAGS.contains(&tag.as_str())
}

/// First non-blank of aria-label, alt, title, placeholder, then inner text
/// cut to `max_chars`, then the tag name.
pub fn label(element: &ElementDescriptor, max_chars: usize) -> String {
    for name in ["aria-label", "alt", "title", "placeholder"] {
        if let Some(value) = element.attr(name).map(str::trim) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    let text: String = element.inner_text.trim().chars().take(max_chars).collect();
    if !text.is_empty() {
        return text;
    }

    element.tag_name()
}

pub fn is_interactive(element: &ElementDescriptor) -> bool {
    let tag = element.tag_name();
    INTERACTIVE_TAGS.contains(&tag.as_str())
        || role_is(element, "button")
        || element.has_click_handler()
        || element.style.cursor.trim() == "pointer"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::element::{ComputedStyle, Rect};

    fn el(tag: &str) -> ElementDescriptor {
        ElementDescriptor::new(tag, Rect::new(10.0, 10.0, 120.0, 40.0))
    }

    fn classify_type(element: &ElementDescriptor) -> ElementType {
        classify(element).0
    }

    fn styled(tag: &str, f: impl FnOnce(&mut ComputedStyle)) -> ElementDescriptor {
        let mut style = ComputedStyle::default();
        f(&mut style);
        el(tag).with_style(style)
    }

    #[test]
    fn classification_follows_precedence() {
        assert_eq!(classify_type(&el("button")), ElementType::Button);
        assert_eq!(classify_type(&el("a")), ElementType::Button);
        assert_eq!(
            classify_type(&el("div").with_attr("class", "submit-btn")),
            ElementType::Button
        );
        assert_eq!(classify_type(&el("input")), ElementType::InputField);
        assert_eq!(classify_type(&el("img")), ElementType::HeroImage);
        assert_eq!(classify_type(&el("div").with_attr("role", "navigation")), ElementType::NavBar);
        assert_eq!(classify_type(&el("header")), ElementType::Header);
        assert_eq!(classify_type(&el("div").with_attr("role", "contentinfo")), ElementType::Footer);
        assert_eq!(classify_type(&el("article")), ElementType::Card);
        assert_eq!(classify_type(&el("div").with_attr("class", "product-card")), ElementType::Card);
        assert_eq!(classify_type(&el("h1")), ElementType::TextBlock);
    }

    #[test]
    fn class_signals_ignore_case() {
        let hero = el("div").with_attr("class", "heroButton-container");
        assert_eq!(classify(&hero), (ElementType::Button, "button signals"));
        let product = el("div").with_attr("class", "ProductCard-container");
        assert_eq!(classify(&product), (ElementType::Card, "card container"));
        assert_eq!(classify_type(&el("div").with_attr("class", "BTN")), ElementType::Button);
    }

    #[test]
    fn unmatched_element_uses_default_rule() {
        assert_eq!(classify(&el("p")), (DEFAULT_ELEMENT_TYPE, "default"));
    }

    #[test]
    fn button_class_beats_landmark_tag() {
        let nav = el("nav").with_attr("class", "button-row");
        assert_eq!(classify_type(&nav), ElementType::Button);
    }

    #[test]
    fn depth_prefers_positioning_then_stacking() {
        assert_eq!(z_depth(&styled("div", |s| s.position = "sticky".into())), 10);
        assert_eq!(z_depth(&styled("img", |s| s.z_index = "101".into())), 9);
        assert_eq!(z_depth(&styled("img", |s| s.z_index = "100".into())), 8);
        assert_eq!(z_depth(&styled("section", |s| s.z_index = "1".into())), 7);
        assert_eq!(z_depth(&styled("button", |s| s.z_index = "-1".into())), 8);
    }

    #[test]
    fn depth_by_tag_and_role() {
        assert_eq!(z_depth(&el("a")), 8);
        assert_eq!(z_depth(&el("textarea")), 7);
        assert_eq!(z_depth(&el("select")), DEFAULT_Z_DEPTH);
        assert_eq!(z_depth(&el("div").with_attr("role", "button")), 8);
        assert_eq!(z_depth(&el("header")), 6);
        assert_eq!(z_depth(&el("footer")), DEFAULT_Z_DEPTH);
        assert_eq!(z_depth(&el("img")), 4);
        assert_eq!(z_depth(&el("article")), 3);
        assert_eq!(z_depth(&el("h2")), DEFAULT_Z_DEPTH);
    }

    #[test]
    fn visibility_checks_style_and_viewport() {
        assert!(is_visible(&el("div"), 900.0));
        assert!(!is_visible(&styled("div", |s| s.display = "none".into()), 900.0));
        assert!(!is_visible(&styled("div", |s| s.visibility = "hidden".into()), 900.0));
        assert!(!is_visible(&styled("div", |s| s.opacity = "0".into()), 900.0));

        let below = ElementDescriptor::new("div", Rect::new(0.0, 900.0, 100.0, 100.0));
        assert!(!is_visible(&below, 900.0));
        let above = ElementDescriptor::new("div", Rect::new(0.0, -100.0, 100.0, 100.0));
        assert!(!is_visible(&above, 900.0));
        let straddling = ElementDescriptor::new("div", Rect::new(0.0, -50.0, 100.0, 100.0));
        assert!(is_visible(&straddling, 900.0));
    }

    #[test]
    fn inclusion_rejects_small_and_denylisted() {
        let small = ElementDescriptor::new("button", Rect::new(0.0, 0.0, 19.9, 100.0));
        assert!(!should_include(&small, 20.0, 900.0));
        let exact = ElementDescriptor::new("button", Rect::new(0.0, 0.0, 20.0, 20.0));
        assert!(should_include(&exact, 20.0, 900.0));
        assert!(!should_include(&el("noscript"), 20.0, 900.0));
        assert!(!should_include(&el("LINK"), 20.0, 900.0));
    }

    #[test]
    fn label_fallback_chain() {
        let full = el("button")
            .with_attr("alt", "alt text")
            .with_attr("aria-label", "Close dialog")
            .with_text("X");
        assert_eq!(label(&full, 60), "Close dialog");

        let blank_aria = el("img").with_attr("aria-label", "  ").with_attr("alt", "Hero");
        assert_eq!(label(&blank_aria, 60), "Hero");

        let placeholder = el("input").with_attr("placeholder", "Email");
        assert_eq!(label(&placeholder, 60), "Email");

        let long_text = el("p").with_text(format!("  {}  ", "é".repeat(80)));
        assert_eq!(label(&long_text, 60).chars().count(), 60);

        assert_eq!(label(&el("SECTION"), 60), "section");
    }

    #[test]
    fn interactivity_signals() {
        assert!(is_interactive(&el("a")));
        assert!(is_interactive(&el("select")));
        assert!(is_interactive(&el("div").with_attr("role", "button")));
        assert!(is_interactive(&el("div").with_attr("onclick", "go()")));
        assert!(is_interactive(&styled("div", |s| s.cursor = "pointer".into())));

        let mut listener = el("li");
        listener.has_click_handler = true;
        assert!(is_interactive(&listener));

        assert!(!is_interactive(&el("nav")));
    }
}

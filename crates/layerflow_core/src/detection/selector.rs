//! CSS selector subset used by the structural queries.
//!
//! Supported: type and universal selectors, `.class`, `#id`, attribute
//! selectors (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`),
//! `:not(compound)` and comma-separated lists. Combinators and other
//! pseudo-classes are rejected.

use thiserror::Error;

use super::element::ElementDescriptor;
use super::errors::DetectionError;

/// Selector text the parser could not accept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector '{selector}': {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

impl From<SelectorError> for DetectionError {
    fn from(err: SelectorError) -> Self {
        DetectionError::InvalidSelector {
            selector: err.selector,
            message: err.message,
        }
    }
}

/// Attribute comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOperator {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
    Includes(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Universal,
    Type(String),
    Class(String),
    Id(String),
    Attribute { name: String, op: AttrOperator },
    Not(Box<CompoundSelector>),
}

/// Sequence of simple selectors that must all match one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundSelector {
    pub parts: Vec<SimpleSelector>,
}

/// Comma-separated alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<CompoundSelector>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser = SelectorParser::new(input);
        let list = parser.parse_list()?;
        parser.skip_spaces();
        if let Some(byte) = parser.peek() {
            return Err(parser.error(format!("unexpected '{}'", byte as char)));
        }
        Ok(list)
    }

    pub fn matches(&self, element: &ElementDescriptor) -> bool {
        self.selectors.iter().any(|s| s.matches(element))
    }
}

impl CompoundSelector {
    pub fn matches(&self, element: &ElementDescriptor) -> bool {
        self.parts.iter().all(|part| part.matches(element))
    }
}

impl SimpleSelector {
    pub fn matches(&self, element: &ElementDescriptor) -> bool {
        match self {
            SimpleSelector::Universal => true,
            SimpleSelector::Type(name) => element.is_tag(name),
            SimpleSelector::Class(class) => element.has_class(class),
            SimpleSelector::Id(id) => element.attr("id") == Some(id.as_str()),
            SimpleSelector::Attribute { name, op } => match element.attr(name) {
                None => false,
                Some(value) => op.matches(value),
            },
            SimpleSelector::Not(inner) => !inner.matches(element),
        }
    }
}

impl AttrOperator {
    fn matches(&self, value: &str) -> bool {
        match self {
            AttrOperator::Exists => true,
            AttrOperator::Equals(expected) => value == expected,
            // Empty needles never match for substring operators.
            AttrOperator::Contains(needle) => !needle.is_empty() && value.contains(needle.as_str()),
            AttrOperator::Prefix(needle) => !needle.is_empty() && value.starts_with(needle.as_str()),
            AttrOperator::Suffix(needle) => !needle.is_empty() && value.ends_with(needle.as_str()),
            AttrOperator::Includes(word) => value.split_ascii_whitespace().any(|w| w == word),
        }
    }
}

/// Byte cursor over a selector string.
struct SelectorParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    index: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            index: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError {
            selector: self.source.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn advance(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.advance();
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), SelectorError> {
        if self.peek() == Some(byte) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_spaces();
            selectors.push(self.parse_compound()?);
            self.skip_spaces();
            match self.peek() {
                Some(b',') => self.advance(),
                None => break,
                Some(b')') => break,
                Some(b'>' | b'+' | b'~') => {
                    return Err(self.error("combinators are not supported"))
                }
                Some(_) => return Err(self.error("descendant combinators are not supported")),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut parts = Vec::new();
        while let Some(byte) = self.peek() {
            let part = match byte {
                b'*' => {
                    self.advance();
                    SimpleSelector::Universal
                }
                b'.' => {
                    self.advance();
                    SimpleSelector::Class(self.consume_name("class name")?)
                }
                b'#' => {
                    self.advance();
                    SimpleSelector::Id(self.consume_name("id")?)
                }
                b'[' => self.consume_attr()?,
                b':' => self.consume_pseudo()?,
                b if is_ident_byte(b) => {
                    if !parts.is_empty() {
                        return Err(self.error("type selector must come first"));
                    }
                    SimpleSelector::Type(self.consume_ident().to_ascii_lowercase())
                }
                _ => break,
            };
            parts.push(part);
        }
        if parts.is_empty() {
            return Err(self.error("expected a selector"));
        }
        Ok(CompoundSelector { parts })
    }

    fn consume_ident(&mut self) -> &'a str {
        let start = self.index;
        while self.peek().is_some_and(is_ident_byte) {
            self.advance();
        }
        let source = self.source;
        &source[start..self.index]
    }

    fn consume_name(&mut self, what: &str) -> Result<String, SelectorError> {
        let ident = self.consume_ident();
        if ident.is_empty() {
            return Err(self.error(format!("expected {}", what)));
        }
        Ok(ident.to_string())
    }

    fn consume_attr(&mut self) -> Result<SimpleSelector, SelectorError> {
        self.expect(b'[')?;
        self.skip_spaces();
        let name = self.consume_name("attribute name")?.to_ascii_lowercase();
        self.skip_spaces();

        let op_byte = match self.peek() {
            Some(b']') => {
                self.advance();
                return Ok(SimpleSelector::Attribute {
                    name,
                    op: AttrOperator::Exists,
                });
            }
            Some(b'=') => None,
            Some(b @ (b'*' | b'^' | b'$' | b'~')) => {
                self.advance();
                Some(b)
            }
            _ => return Err(self.error("unsupported attribute operator")),
        };
        self.expect(b'=')?;
        self.skip_spaces();
        let value = self.consume_attr_value()?;
        self.skip_spaces();
        self.expect(b']')?;

        let op = match op_byte {
            None => AttrOperator::Equals(value),
            Some(b'*') => AttrOperator::Contains(value),
            Some(b'^') => AttrOperator::Prefix(value),
            Some(b'$') => AttrOperator::Suffix(value),
            _ => AttrOperator::Includes(value),
        };
        Ok(SimpleSelector::Attribute { name, op })
    }

    fn consume_attr_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.advance();
                let start = self.index;
                while let Some(byte) = self.peek() {
                    if byte == quote {
                        let value = self.source[start..self.index].to_string();
                        self.advance();
                        return Ok(value);
                    }
                    self.advance();
                }
                Err(self.error("unterminated string"))
            }
            _ => self.consume_name("attribute value"),
        }
    }

    fn consume_pseudo(&mut self) -> Result<SimpleSelector, SelectorError> {
        self.expect(b':')?;
        let name = self.consume_ident().to_ascii_lowercase();
        if name != "not" {
            return Err(self.error(format!(":{} is not supported", name)));
        }
        self.expect(b'(')?;
        self.skip_spaces();
        let inner = self.parse_compound()?;
        self.skip_spaces();
        self.expect(b')')?;
        Ok(SimpleSelector::Not(Box::new(inner)))
    }
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || byte >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::element::Rect;

    fn el(tag: &str) -> ElementDescriptor {
        ElementDescriptor::new(tag, Rect::new(0.0, 0.0, 100.0, 40.0))
    }

    #[test]
    fn parses_every_structural_query() {
        for query in crate::detection::STRUCTURAL_QUERIES {
            assert!(SelectorList::parse(query).is_ok(), "failed: {}", query);
        }
    }

    #[test]
    fn parses_list_into_compounds() {
        let list = SelectorList::parse("button, [role=\"button\"], .btn").unwrap();
        assert_eq!(list.selectors.len(), 3);
        assert_eq!(
            list.selectors[1].parts[0],
            SimpleSelector::Attribute {
                name: "role".to_string(),
                op: AttrOperator::Equals("button".to_string()),
            }
        );
    }

    #[test]
    fn matches_type_class_and_attributes() {
        let list = SelectorList::parse("button, [role=\"button\"], .btn, .button").unwrap();
        assert!(list.matches(&el("BUTTON")));
        assert!(list.matches(&el("div").with_attr("role", "button")));
        assert!(list.matches(&el("span").with_attr("class", "btn primary")));
        assert!(!list.matches(&el("span").with_attr("class", "btn-primary")));
        assert!(!list.matches(&el("div")));

        let anchors = SelectorList::parse("a[href]").unwrap();
        assert!(anchors.matches(&el("a").with_attr("href", "/")));
        assert!(!anchors.matches(&el("a")));
    }

    #[test]
    fn substring_attribute_match() {
        let list = SelectorList::parse("div[class*=\"container\"]").unwrap();
        assert!(list.matches(&el("div").with_attr("class", "page-container wide")));
        assert!(!list.matches(&el("section").with_attr("class", "container")));
        assert!(!list.matches(&el("div").with_attr("class", "wrapper")));
    }

    #[test]
    fn negation_excludes_hidden_inputs() {
        let list = SelectorList::parse("input:not([type=\"hidden\"]), textarea, select").unwrap();
        assert!(list.matches(&el("input").with_attr("type", "email")));
        assert!(list.matches(&el("input")));
        assert!(!list.matches(&el("input").with_attr("type", "hidden")));
        assert!(list.matches(&el("select")));
    }

    #[test]
    fn id_and_universal() {
        let list = SelectorList::parse("*#hero").unwrap();
        assert!(list.matches(&el("div").with_attr("id", "hero")));
        assert!(!list.matches(&el("div").with_attr("id", "other")));
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for bad in ["", "nav a", "ul > li", "a:hover", "[href", "[x|=y]", ".", "div,"] {
            let err = SelectorList::parse(bad).unwrap_err();
            assert_eq!(err.selector, bad);
        }
    }

    #[test]
    fn converts_into_detection_error() {
        let err: DetectionError = SelectorList::parse("a:hover").unwrap_err().into();
        assert!(matches!(err, DetectionError::InvalidSelector { .. }));
    }
}

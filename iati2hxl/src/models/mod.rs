//! Domain model for one activity record.
//!
//! An [`Element`] is an owned XML subtree. The parser builds one per
//! `iati-activity` and hands it to the extractor, which drops it as soon as
//! the row is built.

/// An XML element with its attributes, direct text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local element name (e.g. `activity-date`)
    pub name: String,
    /// Attributes in document order, keys as written (e.g. `xml:lang`)
    pub attributes: Vec<(String, String)>,
    /// Text directly inside this element, not including descendants
    pub text: String,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder: set direct text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder: append a child.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct text with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

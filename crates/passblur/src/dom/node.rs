//! Node types of the document model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a node in a [`Document`](super::Document).
///
/// Ids are generational: once a node is freed its slot gets a new
/// generation, so a stale id never refers to a node created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Layout box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Offset from the left of the offset parent.
    pub x: f64,
    /// Offset from the top of the offset parent.
    pub y: f64,
    /// Rendered width.
    pub width: f64,
    /// Rendered height.
    pub height: f64,
}

impl Rect {
    /// Create a new rect.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rect with the given size at the origin.
    #[must_use]
    pub const fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// The payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// A run of text.
    Text(String),
    /// An element with attributes.
    Element(Element),
}

/// An element node's data.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    value: Option<String>,
    bounds: Rect,
}

impl Element {
    /// Create an element with a lowercased tag name.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            value: None,
            bounds: Rect::default(),
        }
    }

    /// The lowercased tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// An attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Option<String> {
        self.attributes.insert(name.to_string(), value.to_string())
    }

    /// Remove an attribute, returning the previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    /// All attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check for a class in the `class` attribute.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    /// Add a class. Returns `false` if it was already present.
    pub fn add_class(&mut self, class: &str) -> bool {
        if self.has_class(class) {
            return false;
        }
        let list = match self.attribute("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute("class", &list);
        true
    }

    /// Remove a class. Returns `false` if it was not present.
    pub fn remove_class(&mut self, class: &str) -> bool {
        if !self.has_class(class) {
            return false;
        }
        let list: Vec<&str> = self
            .attribute("class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        let list = list.join(" ");
        if list.is_empty() {
            self.remove_attribute("class");
        } else {
            self.set_attribute("class", &list);
        }
        true
    }

    /// The live `value` property of a form control.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Set the live `value` property.
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// The layout box.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Set the layout box.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
        }
    }
}

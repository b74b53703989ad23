//! Mutation observation types.

use super::NodeId;

/// What an observer listens for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverOptions {
    /// Report child insertions and removals.
    pub child_list: bool,
    /// Report changes anywhere below the observed root, not just on it.
    pub subtree: bool,
    /// Report attribute changes.
    pub attributes: bool,
    /// Restrict attribute reports to these names. Empty means all.
    pub attribute_filter: Vec<String>,
}

impl ObserverOptions {
    /// Check whether a change to the named attribute is reported.
    #[must_use]
    pub fn accepts_attribute(&self, name: &str) -> bool {
        self.attributes
            && (self.attribute_filter.is_empty() || self.attribute_filter.iter().any(|a| a == name))
    }
}

/// The kind of change a record describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were inserted into or removed from the target.
    ChildList {
        /// Nodes inserted, in document order.
        added: Vec<NodeId>,
        /// Nodes removed. They may already be freed.
        removed: Vec<NodeId>,
    },
    /// An attribute of the target changed.
    Attributes {
        /// Name of the changed attribute.
        name: String,
        /// Value before the change.
        old_value: Option<String>,
    },
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// The node whose children or attributes changed.
    pub target: NodeId,
    /// What changed.
    pub kind: MutationKind,
}

impl MutationRecord {
    /// Nodes added by this record.
    #[must_use]
    pub fn added_nodes(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            MutationKind::Attributes { .. } => &[],
        }
    }

    /// Nodes removed by this record.
    #[must_use]
    pub fn removed_nodes(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { removed, .. } => removed,
            MutationKind::Attributes { .. } => &[],
        }
    }

    /// Name of the changed attribute, for attribute records.
    #[must_use]
    pub fn attribute_name(&self) -> Option<&str> {
        match &self.kind {
            MutationKind::Attributes { name, .. } => Some(name),
            MutationKind::ChildList { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_attribute_with_filter() {
        let options = ObserverOptions {
            attributes: true,
            attribute_filter: vec!["value".to_string()],
            ..ObserverOptions::default()
        };
        assert!(options.accepts_attribute("value"));
        assert!(!options.accepts_attribute("style"));
    }

    #[test]
    fn test_accepts_attribute_without_filter() {
        let options = ObserverOptions {
            attributes: true,
            ..ObserverOptions::default()
        };
        assert!(options.accepts_attribute("style"));

        let options = ObserverOptions::default();
        assert!(!options.accepts_attribute("value"));
    }

    #[test]
    fn test_record_accessors() {
        let node = NodeId::new(1, 0);
        let record = MutationRecord {
            target: node,
            kind: MutationKind::Attributes {
                name: "value".to_string(),
                old_value: None,
            },
        };
        assert_eq!(record.attribute_name(), Some("value"));
        assert!(record.added_nodes().is_empty());
        assert!(record.removed_nodes().is_empty());
    }
}

//! In-memory document model.
//!
//! The engine masks against a small tree of elements and text nodes that
//! mirrors what a page host exposes: attributes (with classes kept in the
//! `class` attribute), a live `value` property on form controls, layout
//! boxes, a single selection, and a mutation observer whose records are
//! drained by the host.

mod document;
mod mutation;
mod node;

use thiserror::Error;

pub use document::Document;
pub use mutation::{MutationKind, MutationRecord, ObserverOptions};
pub use node::{Element, NodeData, NodeId, Rect};

/// Errors raised by tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The id does not refer to a live node.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The operation requires an element.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// The operation requires a text node.
    #[error("node {0} is not a text node")]
    NotAText(NodeId),

    /// The node has no parent.
    #[error("node {0} is not attached")]
    Detached(NodeId),

    /// The reference node is not a child of the parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild {
        /// The expected parent.
        parent: NodeId,
        /// The node that was not found among its children.
        child: NodeId,
    },

    /// The change would produce an invalid tree.
    #[error("invalid hierarchy: {0}")]
    HierarchyRequest(String),
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, DomError>;

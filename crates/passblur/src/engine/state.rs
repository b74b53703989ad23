//! Tracking state for masked elements.

use std::collections::HashSet;

use serde::Serialize;

use crate::detection::Category;
use crate::dom::NodeId;

/// Class of the wrapper span around masked text.
pub const WRAPPER_CLASS: &str = "passblur-wrapper";
/// Class of the blurred span holding the original text.
pub const BLURRED_CLASS: &str = "passblur-blurred";
/// Class of tooltips inside wrappers and overlays.
pub const TOOLTIP_CLASS: &str = "passblur-tooltip";
/// Class added to a wrapper or field while it is revealed.
pub const REVEALED_CLASS: &str = "passblur-revealed";
/// Class marking a masked form field.
pub const PROCESSED_FIELD_CLASS: &str = "passblur-input-processed";
/// Class of the click-intercepting overlay over a masked field.
pub const OVERLAY_CLASS: &str = "passblur-input-overlay";
/// Class of the transient copy notification.
pub const NOTIFICATION_CLASS: &str = "passblur-notification";
/// Class of the hidden textarea used by the legacy copy path.
pub const CLIPBOARD_BUFFER_CLASS: &str = "passblur-clipboard-buffer";

/// Classes of every element the engine inserts into a page.
pub(crate) const ENGINE_CLASSES: [&str; 6] = [
    WRAPPER_CLASS,
    BLURRED_CLASS,
    TOOLTIP_CLASS,
    OVERLAY_CLASS,
    NOTIFICATION_CLASS,
    CLIPBOARD_BUFFER_CLASS,
];

/// Original value attribute on masked spans.
pub const SPAN_ORIGINAL_ATTR: &str = "data-original";
/// Label attribute on masked spans.
pub const SPAN_LABEL_ATTR: &str = "data-key-type";
/// Original value attribute on masked fields.
pub const FIELD_ORIGINAL_ATTR: &str = "data-passblur-original";
/// Label attribute on masked fields.
pub const FIELD_LABEL_ATTR: &str = "data-passblur-type";
/// Pre-mask inline style attribute on masked fields.
pub const FIELD_STYLE_ATTR: &str = "data-passblur-style";

/// A masked span or form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedElement {
    /// The raw value that was masked.
    pub original: String,
    /// Category of the detection.
    pub category: Category,
    /// Label of the detection.
    pub label: &'static str,
    /// Whether the element is currently revealed.
    pub revealed: bool,
    /// How the element was masked.
    pub kind: TrackedKind,
}

/// The two kinds of masked element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TrackedKind {
    /// A span inserted in place of matched text.
    Span {
        /// The `span.passblur-wrapper`.
        #[serde(skip)]
        wrapper: NodeId,
        /// The `span.passblur-blurred` inside the wrapper.
        #[serde(skip)]
        blurred: NodeId,
        /// Inline style of the blurred span while hidden.
        masked_style: String,
    },
    /// A form field obscured in place with an overlay on top.
    Field {
        /// The masked field.
        #[serde(skip)]
        field: NodeId,
        /// The overlay inserted after the field.
        #[serde(skip)]
        overlay: NodeId,
        /// The field's inline style before masking. `None` if it had none.
        style_snapshot: Option<String>,
        /// Inline style of the field while hidden.
        masked_style: String,
        /// Inline style of the overlay while hidden.
        overlay_style: String,
    },
}

impl TrackedElement {
    /// The node this element is keyed by: the wrapper or the field.
    #[must_use]
    pub fn anchor(&self) -> NodeId {
        match self.kind {
            TrackedKind::Span { wrapper, .. } => wrapper,
            TrackedKind::Field { field, .. } => field,
        }
    }

    /// The overlay of a masked field.
    #[must_use]
    pub fn overlay(&self) -> Option<NodeId> {
        match self.kind {
            TrackedKind::Span { .. } => None,
            TrackedKind::Field { overlay, .. } => Some(overlay),
        }
    }

    /// Check whether this is a masked span.
    #[must_use]
    pub fn is_span(&self) -> bool {
        matches!(self.kind, TrackedKind::Span { .. })
    }
}

/// Elements mid-classification and elements finalized as masked.
///
/// An element is in at most one of the two sets.
#[derive(Debug, Default)]
pub(crate) struct ProcessingState {
    processing: HashSet<NodeId>,
    masked: HashSet<NodeId>,
}

impl ProcessingState {
    /// Claim a node for classification. Returns `false` if it is already
    /// being classified or already masked.
    pub(crate) fn begin(&mut self, node: NodeId) -> bool {
        if self.masked.contains(&node) {
            return false;
        }
        self.processing.insert(node)
    }

    /// Release a claimed node, recording whether it ended up masked.
    pub(crate) fn finish(&mut self, node: NodeId, masked: bool) {
        self.processing.remove(&node);
        if masked {
            self.masked.insert(node);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_processing(&self, node: NodeId) -> bool {
        self.processing.contains(&node)
    }

    pub(crate) fn is_masked(&self, node: NodeId) -> bool {
        self.masked.contains(&node)
    }

    pub(crate) fn forget(&mut self, node: NodeId) {
        self.masked.remove(&node);
    }

    pub(crate) fn clear(&mut self) {
        self.processing.clear();
        self.masked.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.processing.is_empty()
    }
}

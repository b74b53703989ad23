//! Field-mode masking.
//!
//! Form fields and code blocks keep their content. They are obscured with an
//! inline style and covered by an overlay that intercepts clicks, while the
//! pre-mask style and the value are kept in `data-passblur-*` attributes.

use tracing::{debug, trace, warn};

use super::state::{
    TrackedElement, TrackedKind, FIELD_LABEL_ATTR, FIELD_ORIGINAL_ATTR, FIELD_STYLE_ATTR,
    OVERLAY_CLASS, PROCESSED_FIELD_CLASS, TOOLTIP_CLASS, WRAPPER_CLASS,
};
use super::text::tooltip_text;
use super::{ClipboardWriter, Engine};
use crate::detection::{Detection, FieldHints};
use crate::dom::{Document, DomError, NodeId, Rect};
use crate::error::{Error, Result};

/// `type` values of `<input>` elements that can hold a sensitive value.
const FIELD_INPUT_TYPES: [&str; 7] = ["", "text", "password", "search", "tel", "email", "url"];

/// Non-input elements treated as fields.
const BLOCK_FIELD_TAGS: [&str; 2] = ["pre", "code"];

/// Cap on the masked field's height, and the fallback when it has no layout.
const MASKED_MAX_HEIGHT: f64 = 100.0;
/// Fallback width for a field without layout.
const MASKED_DEFAULT_WIDTH: f64 = 500.0;
/// Cap on the masked field's width.
const MASKED_MAX_WIDTH: f64 = 600.0;

impl<C: ClipboardWriter> Engine<C> {
    /// Classify a field and mask it if it holds a sensitive value.
    ///
    /// Returns `true` if this call masked the field or, for a container, a
    /// descendant holding the value. Repeated calls on a masked field do
    /// nothing.
    pub fn scan_field(&mut self, node: NodeId) -> bool {
        if !self.is_active() || !self.is_unmasked_field(node) || !self.state.begin(node) {
            return false;
        }

        let result = if self.admit_operation() {
            self.mask_field(node)
        } else {
            Ok(None)
        };

        match result {
            Ok(Some(masked)) => {
                self.state.finish(node, masked == node);
                if masked != node {
                    self.state.finish(masked, true);
                }
                true
            }
            Ok(None) => {
                self.state.finish(node, false);
                false
            }
            Err(err) => {
                self.state.finish(node, false);
                if err.is_skippable() {
                    debug!(%node, %err, "Skipping field");
                } else {
                    warn!(%node, %err, "Failed to mask field");
                }
                false
            }
        }
    }

    /// Scan every field in the page.
    pub(super) fn sweep_fields(&mut self) {
        let body = self.document.body();
        let fields: Vec<NodeId> = self
            .document
            .descendants(body)
            .into_iter()
            .filter(|n| self.is_field_candidate(*n))
            .collect();

        for field in fields {
            if !self.is_active() {
                break;
            }
            self.scan_field(field);
        }
    }

    /// Inputs with a text-like type and textareas.
    pub(super) fn is_input_like(&self, node: NodeId) -> bool {
        match self.document.tag(node) {
            Some("input") => {
                let kind = self
                    .document
                    .attribute(node, "type")
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                FIELD_INPUT_TYPES.contains(&kind.as_str())
            }
            Some("textarea") => true,
            _ => false,
        }
    }

    /// Input-like elements plus `pre` and `code` blocks.
    pub(super) fn is_field_candidate(&self, node: NodeId) -> bool {
        self.is_input_like(node)
            || self
                .document
                .tag(node)
                .is_some_and(|tag| BLOCK_FIELD_TAGS.contains(&tag))
    }

    fn is_unmasked_field(&self, node: NodeId) -> bool {
        self.is_field_candidate(node)
            && self.document.is_connected(node)
            && !self.document.has_class(node, PROCESSED_FIELD_CLASS)
            && !self.state.is_masked(node)
            && !self.is_engine_node(node)
            && !self.contains_masked_spans(node)
    }

    fn contains_masked_spans(&self, node: NodeId) -> bool {
        self.document
            .descendants(node)
            .into_iter()
            .any(|n| self.document.has_class(n, WRAPPER_CLASS))
    }

    /// The value a field shows: the live value, the value attribute, the
    /// placeholder or the text content, whichever is first non-empty.
    pub(super) fn effective_value(&self, node: NodeId) -> Option<String> {
        let doc = &self.document;
        [
            doc.value(node),
            doc.attribute(node, "value"),
            doc.attribute(node, "placeholder"),
        ]
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| Some(doc.text_content(node)).filter(|v| !v.is_empty()))
    }

    fn is_container(&self, node: NodeId) -> bool {
        let bounds = self.document.bounds(node);
        bounds.height > self.config.masking.container_max_height
            || bounds.width > self.config.masking.container_max_width
    }

    /// Returns the node that was masked, if any.
    fn mask_field(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        let value = self
            .effective_value(node)
            .ok_or_else(|| Error::unclassifiable("field has no value"))?;

        let detection = {
            let doc = &self.document;
            let hints = FieldHints {
                name: doc.attribute(node, "name"),
                id: doc.attribute(node, "id"),
                placeholder: doc.attribute(node, "placeholder"),
            };
            self.classifier.classify_field(&value, &hints)
        };
        let Some(detection) = detection else {
            trace!(%node, "Field is not sensitive");
            return Ok(None);
        };

        if !self.is_container(node) {
            self.apply_field_mask(node, value, &detection)?;
            return Ok(Some(node));
        }

        let needle = detection.matched(&value).to_string();
        let Some(holder) = self.find_value_holder(node, &needle) else {
            debug!(%node, label = detection.label, "Container has no element small enough to mask");
            return Ok(None);
        };
        let original = self.effective_value(holder).unwrap_or(needle);
        self.apply_field_mask(holder, original, &detection)?;
        Ok(Some(holder))
    }

    /// The first descendant small enough to mask that shows `needle`.
    fn find_value_holder(&self, container: NodeId, needle: &str) -> Option<NodeId> {
        self.document.descendants(container).into_iter().find(|n| {
            self.document.is_element(*n)
                && !self.is_container(*n)
                && !self.document.has_class(*n, PROCESSED_FIELD_CLASS)
                && !self.state.is_masked(*n)
                && !self.is_engine_node(*n)
                && self
                    .effective_value(*n)
                    .is_some_and(|value| value.contains(needle))
        })
    }

    fn apply_field_mask(
        &mut self,
        field: NodeId,
        original: String,
        detection: &Detection,
    ) -> Result<()> {
        let parent = self
            .document
            .parent(field)
            .ok_or(DomError::Detached(field))?;
        let next = self.document.next_sibling(field);
        let bounds = self.document.bounds(field);
        let style_snapshot = self.document.attribute(field, "style").map(str::to_string);
        let masked_style = masked_field_style(
            style_snapshot.as_deref(),
            bounds,
            self.config.masking.blur_radius_px,
        );
        let overlay_style = overlay_style(bounds);

        let overlay = build_overlay(&mut self.document, &overlay_style, detection.label)?;
        if let Err(err) = self.document.insert_before(parent, overlay, next) {
            let _ = self.document.remove(overlay);
            return Err(err.into());
        }

        let doc = &mut self.document;
        doc.set_attribute(field, FIELD_ORIGINAL_ATTR, &original)?;
        doc.set_attribute(field, FIELD_LABEL_ATTR, detection.label)?;
        doc.set_attribute(
            field,
            FIELD_STYLE_ATTR,
            style_snapshot.as_deref().unwrap_or_default(),
        )?;
        doc.add_class(field, PROCESSED_FIELD_CLASS)?;
        doc.set_attribute(field, "style", &masked_style)?;

        debug!(label = detection.label, %field, %overlay, "Masked field");
        self.overlays.insert(overlay, field);
        self.tracked.insert(
            field,
            TrackedElement {
                original,
                category: detection.category,
                label: detection.label,
                revealed: false,
                kind: TrackedKind::Field {
                    field,
                    overlay,
                    style_snapshot,
                    masked_style,
                    overlay_style,
                },
            },
        );
        Ok(())
    }
}

/// A detached overlay holding a tooltip.
fn build_overlay(doc: &mut Document, style: &str, label: &str) -> crate::dom::Result<NodeId> {
    let overlay = doc.create_element("div");
    doc.set_attribute(overlay, "class", OVERLAY_CLASS)?;
    doc.set_attribute(overlay, "style", style)?;
    let tooltip = doc.append_element(overlay, "span", &[("class", TOOLTIP_CLASS)])?;
    doc.append_text(tooltip, &tooltip_text(label))?;
    Ok(overlay)
}

/// Obscuring style for a field, appended to its existing inline style.
fn masked_field_style(existing: Option<&str>, bounds: Rect, blur_px: u32) -> String {
    let height = if bounds.height > 0.0 {
        bounds.height.min(MASKED_MAX_HEIGHT)
    } else {
        MASKED_MAX_HEIGHT
    };
    let width = if bounds.width > 0.0 {
        bounds.width.min(MASKED_MAX_WIDTH)
    } else {
        MASKED_DEFAULT_WIDTH
    };
    let prefix = existing
        .map(|s| s.trim().trim_end_matches(';').trim())
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s}; "))
        .unwrap_or_default();
    format!(
        "{prefix}filter: blur({blur_px}px) !important; color: transparent !important; \
         max-height: {height}px; max-width: {width}px; overflow: hidden;"
    )
}

/// Overlay positioned over the field's box.
fn overlay_style(bounds: Rect) -> String {
    format!(
        "position: absolute; left: {}px; top: {}px; width: {}px; height: {}px; \
         z-index: 2147483646; cursor: pointer; background: transparent;",
        bounds.x, bounds.y, bounds.width, bounds.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::MemoryClipboard;

    fn engine_with(doc: Document) -> Engine<MemoryClipboard> {
        let mut engine = Engine::new(doc, Config::default(), MemoryClipboard::new());
        engine.start();
        engine
    }

    #[test]
    fn test_card_field_is_masked() {
        let mut doc = Document::new();
        let input = doc
            .append_element(doc.body(), "input", &[("name", "cc-number")])
            .unwrap();
        doc.set_value(input, "4111-1111-1111-1111").unwrap();

        let engine = engine_with(doc);
        let tracked = engine.tracked(input).unwrap();
        assert_eq!(tracked.label, "Credit Card");
        assert_eq!(tracked.original, "4111-1111-1111-1111");

        let doc = engine.document();
        assert!(doc.has_class(input, PROCESSED_FIELD_CLASS));
        assert_eq!(doc.attribute(input, FIELD_LABEL_ATTR), Some("Credit Card"));
        assert_eq!(
            doc.attribute(input, FIELD_ORIGINAL_ATTR),
            Some("4111-1111-1111-1111")
        );
        assert_eq!(doc.attribute(input, FIELD_STYLE_ATTR), Some(""));

        let overlay = doc.next_sibling(input).unwrap();
        assert!(doc.has_class(overlay, OVERLAY_CLASS));
        assert_eq!(tracked.overlay(), Some(overlay));
    }

    #[test]
    fn test_field_entry_twice_is_idempotent() {
        let mut doc = Document::new();
        let input = doc.append_element(doc.body(), "input", &[]).unwrap();
        doc.set_value(input, "hello a@b.com").unwrap();

        let mut engine = Engine::new(doc, Config::default(), MemoryClipboard::new());
        assert!(engine.scan_field(input));
        assert!(!engine.scan_field(input));

        let overlays = engine
            .document()
            .descendants(engine.document().body())
            .into_iter()
            .filter(|n| engine.document().has_class(*n, OVERLAY_CLASS))
            .count();
        assert_eq!(overlays, 1);
        assert_eq!(engine.status().count, 1);
        assert!(engine.state.is_idle());
    }

    #[test]
    fn test_card_exclusion_keyword() {
        let mut doc = Document::new();
        let input = doc
            .append_element(doc.body(), "input", &[("name", "billing-address")])
            .unwrap();
        doc.set_value(input, "4111111111111111").unwrap();

        let engine = engine_with(doc);
        assert!(engine.tracked(input).is_none());
    }

    #[test]
    fn test_non_text_inputs_are_ignored() {
        let mut doc = Document::new();
        let input = doc
            .append_element(doc.body(), "input", &[("type", "hidden")])
            .unwrap();
        doc.set_value(input, "a@b.com").unwrap();

        let engine = engine_with(doc);
        assert_eq!(engine.status().count, 0);
    }

    #[test]
    fn test_effective_value_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc
            .append_element(body, "input", &[("value", "attr"), ("placeholder", "ph")])
            .unwrap();
        let b = doc
            .append_element(body, "input", &[("placeholder", "ph")])
            .unwrap();
        let c = doc.append_element(body, "code", &[]).unwrap();
        doc.append_text(c, "text").unwrap();
        doc.set_value(a, "live").unwrap();
        let d = doc.append_element(body, "input", &[]).unwrap();

        let engine = Engine::new(doc, Config::default(), MemoryClipboard::new());
        assert_eq!(engine.effective_value(a).as_deref(), Some("live"));
        assert_eq!(engine.effective_value(b).as_deref(), Some("ph"));
        assert_eq!(engine.effective_value(c).as_deref(), Some("text"));
        assert_eq!(engine.effective_value(d), None);
    }

    #[test]
    fn test_masked_style_bounds() {
        let style = masked_field_style(Some("color: red;"), Rect::sized(300.0, 40.0), 6);
        assert!(style.starts_with("color: red; filter: blur(6px)"));
        assert!(style.contains("max-height: 40px"));
        assert!(style.contains("max-width: 300px"));

        let style = masked_field_style(None, Rect::default(), 6);
        assert!(style.starts_with("filter:"));
        assert!(style.contains("max-height: 100px"));
        assert!(style.contains("max-width: 500px"));

        let style = masked_field_style(None, Rect::sized(700.0, 150.0), 6);
        assert!(style.contains("max-height: 100px"));
        assert!(style.contains("max-width: 600px"));
    }

    #[test]
    fn test_container_masks_inner_holder() {
        let mut doc = Document::new();
        let pre = doc.append_element(doc.body(), "pre", &[]).unwrap();
        doc.set_bounds(pre, Rect::sized(900.0, 400.0)).unwrap();
        let line = doc.append_element(pre, "span", &[]).unwrap();
        doc.set_bounds(line, Rect::sized(400.0, 20.0)).unwrap();
        doc.append_text(line, "key a@b.com").unwrap();

        let mut engine = Engine::new(doc, Config::default(), MemoryClipboard::new());
        assert!(engine.scan_field(pre));

        assert!(engine.tracked(pre).is_none());
        assert!(engine.tracked(line).is_some());
        assert!(!engine.document().has_class(pre, PROCESSED_FIELD_CLASS));
        assert!(engine.document().has_class(line, PROCESSED_FIELD_CLASS));
    }

    #[test]
    fn test_container_without_holder_stays_untracked() {
        let mut doc = Document::new();
        let textarea = doc.append_element(doc.body(), "textarea", &[]).unwrap();
        doc.set_bounds(textarea, Rect::sized(1000.0, 600.0)).unwrap();
        doc.set_value(textarea, "a@b.com").unwrap();

        let mut engine = Engine::new(doc, Config::default(), MemoryClipboard::new());
        assert!(!engine.scan_field(textarea));
        assert_eq!(engine.status().count, 0);
        assert!(engine.document().attribute(textarea, "style").is_none());
        assert!(engine.state.is_idle());
    }

    #[test]
    fn test_field_with_masked_spans_is_skipped() {
        let mut doc = Document::new();
        let code = doc.append_element(doc.body(), "code", &[]).unwrap();
        doc.append_text(code, "a@b.com").unwrap();

        let engine = engine_with(doc);
        assert_eq!(engine.status().count, 1);
        assert!(engine.tracked(code).is_none());
    }
}

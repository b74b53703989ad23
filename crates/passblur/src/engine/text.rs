//! Text-mode masking.
//!
//! A text node with detections is replaced by plain runs interleaved with
//! masked spans:
//!
//! ```text
//! span.passblur-wrapper[data-original][data-key-type]
//!   span.passblur-blurred   (original text, blurred)
//!   span.passblur-tooltip   ("🔒 {label} - Click to copy")
//! ```

use tracing::{debug, trace, warn};

use super::state::{
    TrackedElement, TrackedKind, BLURRED_CLASS, PROCESSED_FIELD_CLASS, SPAN_LABEL_ATTR,
    SPAN_ORIGINAL_ATTR, TOOLTIP_CLASS, WRAPPER_CLASS,
};
use super::{ClipboardWriter, Engine, SuspendReason};
use crate::detection::Detection;
use crate::dom::NodeId;
use crate::error::{Error, Result};

/// Elements whose text is never scanned.
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "textarea"];

/// Tooltip text for a masked value.
pub(super) fn tooltip_text(label: &str) -> String {
    format!("🔒 {label} - Click to copy")
}

impl<C: ClipboardWriter> Engine<C> {
    /// Mask every detection in a text node.
    ///
    /// Returns the number of spans created. Nodes that were already scanned,
    /// sit inside skipped or engine-created elements, or are detached are
    /// left alone.
    pub fn scan_text_node(&mut self, node: NodeId) -> usize {
        if !self.is_active() || !self.is_text_candidate(node) {
            return 0;
        }
        if self
            .document
            .text(node)
            .is_some_and(|text| text.trim().is_empty())
        {
            self.processed_text.insert(node);
            return 0;
        }
        if !self.state.begin(node) {
            return 0;
        }

        let result = self.mask_text(node);
        self.state.finish(node, false);

        match result {
            Ok(created) => created,
            Err(err) if err.is_skippable() => {
                debug!(%node, %err, "Skipping text node");
                0
            }
            Err(err) => {
                warn!(%node, %err, "Failed to mask text node");
                0
            }
        }
    }

    /// Scan every text node in the page, in document order.
    pub(super) fn sweep_text(&mut self) {
        let body = self.document.body();
        let nodes: Vec<NodeId> = self
            .document
            .descendants(body)
            .into_iter()
            .filter(|n| self.document.is_text(*n))
            .collect();

        for node in nodes {
            if !self.is_active() {
                break;
            }
            self.scan_text_node(node);
        }
    }

    /// Text sweep followed by field sweep.
    pub(super) fn sweep(&mut self) {
        if !self.is_active() {
            return;
        }
        self.sweep_text();
        self.sweep_fields();
        trace!(count = self.tracked.len(), "Sweep finished");
    }

    fn is_text_candidate(&self, node: NodeId) -> bool {
        self.document.is_text(node)
            && !self.processed_text.contains(&node)
            && self.document.is_connected(node)
            && self
                .document
                .parent(node)
                .is_some_and(|parent| !self.is_skipped_subtree(parent))
    }

    /// Check whether text under `element` must not be scanned.
    fn is_skipped_subtree(&self, element: NodeId) -> bool {
        self.is_engine_node(element)
            || self
                .document
                .closest(element, |n| {
                    self.document
                        .tag(n)
                        .is_some_and(|tag| SKIPPED_TAGS.contains(&tag))
                        || self.document.has_class(n, PROCESSED_FIELD_CLASS)
                })
                .is_some()
    }

    fn mask_text(&mut self, node: NodeId) -> Result<usize> {
        if !self.admit_operation() {
            return Ok(0);
        }

        let text = self
            .document
            .text(node)
            .ok_or_else(|| Error::unclassifiable("text node vanished"))?
            .to_string();
        let detections = self.classifier.find_all(&text);
        if detections.is_empty() {
            self.processed_text.insert(node);
            return Ok(0);
        }

        let capacity = self.governor.span_capacity(self.span_count());
        let allowed = detections.len().min(capacity);
        let refused = detections.len() - allowed;
        if refused > 0 {
            warn!(
                limit = self.config.governor.max_masked_spans,
                refused,
                cooldown_ms = self.config.governor.span_limit_cooldown_ms,
                "Masked span limit reached, suspending protection"
            );
            self.suspend(SuspendReason::SpanLimit);
        }
        if allowed == 0 {
            return Ok(0);
        }

        let mut runs = Vec::with_capacity(allowed * 2 + 1);
        let mut plain = Vec::new();
        let mut spans = Vec::with_capacity(allowed);
        let mut cursor = 0;

        for detection in &detections[..allowed] {
            if detection.span.start > cursor {
                let run = self.document.create_text(&text[cursor..detection.span.start]);
                runs.push(run);
                plain.push(run);
            }
            let (wrapper, tracked) = self.build_span(detection, &text)?;
            runs.push(wrapper);
            spans.push((wrapper, tracked));
            cursor = detection.span.end;
        }
        if cursor < text.len() {
            let run = self.document.create_text(&text[cursor..]);
            runs.push(run);
            // Refused matches stay in the tail, so it must remain scannable.
            if refused == 0 {
                plain.push(run);
            }
        }

        if let Err(err) = self.document.replace_with(node, &runs) {
            for run in runs {
                let _ = self.document.remove(run);
            }
            return Err(err.into());
        }

        self.processed_text.extend(plain);
        for (wrapper, tracked) in spans {
            debug!(label = tracked.label, %wrapper, "Masked text");
            self.tracked.insert(wrapper, tracked);
        }
        Ok(allowed)
    }

    fn build_span(
        &mut self,
        detection: &Detection,
        text: &str,
    ) -> Result<(NodeId, TrackedElement)> {
        let original = detection.matched(text);
        let masked_style = format!(
            "filter: blur({}px); user-select: none; cursor: pointer;",
            self.config.masking.blur_radius_px
        );

        let doc = &mut self.document;
        let wrapper = doc.create_element("span");
        doc.set_attribute(wrapper, "class", WRAPPER_CLASS)?;
        doc.set_attribute(wrapper, SPAN_ORIGINAL_ATTR, original)?;
        doc.set_attribute(wrapper, SPAN_LABEL_ATTR, detection.label)?;

        let blurred = doc.append_element(
            wrapper,
            "span",
            &[("class", BLURRED_CLASS), ("style", masked_style.as_str())],
        )?;
        doc.append_text(blurred, original)?;

        let tooltip = doc.append_element(wrapper, "span", &[("class", TOOLTIP_CLASS)])?;
        doc.append_text(tooltip, &tooltip_text(detection.label))?;

        Ok((
            wrapper,
            TrackedElement {
                original: original.to_string(),
                category: detection.category,
                label: detection.label,
                revealed: false,
                kind: TrackedKind::Span {
                    wrapper,
                    blurred,
                    masked_style,
                },
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::detection::{Category, DetectionFilterSet};
    use crate::dom::Document;
    use crate::engine::MemoryClipboard;

    fn engine_with(doc: Document, config: Config) -> Engine<MemoryClipboard> {
        let mut engine = Engine::new(doc, config, MemoryClipboard::new());
        engine.start();
        engine
    }

    #[test]
    fn test_masks_matches_in_place() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.body(), "p", &[]).unwrap();
        doc.append_text(p, "mail a@b.com now").unwrap();

        let engine = engine_with(doc, Config::default());
        let doc = engine.document();
        let children = doc.children(p);

        assert_eq!(children.len(), 3);
        assert_eq!(doc.text(children[0]), Some("mail "));
        assert!(doc.has_class(children[1], WRAPPER_CLASS));
        assert_eq!(doc.attribute(children[1], SPAN_ORIGINAL_ATTR), Some("a@b.com"));
        assert_eq!(doc.attribute(children[1], SPAN_LABEL_ATTR), Some("Email"));
        assert_eq!(doc.text(children[2]), Some(" now"));
        assert_eq!(engine.status().count, 1);
    }

    #[test]
    fn test_span_structure() {
        let mut doc = Document::new();
        doc.append_text(doc.body(), "a@b.com").unwrap();

        let engine = engine_with(doc, Config::default());
        let doc = engine.document();
        let wrapper = doc.children(doc.body())[0];
        let parts = doc.children(wrapper);

        assert_eq!(parts.len(), 2);
        assert!(doc.has_class(parts[0], BLURRED_CLASS));
        assert_eq!(doc.text_content(parts[0]), "a@b.com");
        assert!(doc.attribute(parts[0], "style").unwrap().contains("blur(6px)"));
        assert!(doc.has_class(parts[1], TOOLTIP_CLASS));
        assert_eq!(doc.text_content(parts[1]), "🔒 Email - Click to copy");
    }

    #[test]
    fn test_only_enabled_categories_are_masked() {
        let mut doc = Document::new();
        doc.append_text(doc.body(), "contact me at a@b.com or 555-123-4567")
            .unwrap();

        let mut config = Config::default();
        config.protection.filters = DetectionFilterSet::only(&[Category::Emails]);
        let engine = engine_with(doc, config);

        let masked: Vec<&str> = engine.tracked_elements().map(|t| t.original.as_str()).collect();
        assert_eq!(masked, vec!["a@b.com"]);
        assert!(engine
            .document()
            .text_content(engine.document().body())
            .contains("555-123-4567"));
    }

    #[test]
    fn test_skips_script_and_textarea_text() {
        let mut doc = Document::new();
        let script = doc.append_element(doc.body(), "script", &[]).unwrap();
        doc.append_text(script, "var email = 'a@b.com';").unwrap();
        let style = doc.append_element(doc.body(), "style", &[]).unwrap();
        doc.append_text(style, "/* a@b.com */").unwrap();

        let engine = engine_with(doc, Config::default());
        assert_eq!(engine.status().count, 0);
    }

    #[test]
    fn test_rescanning_a_node_is_a_no_op() {
        let mut doc = Document::new();
        let text = doc.append_text(doc.body(), "nothing to see here").unwrap();

        let mut engine = engine_with(doc, Config::default());
        assert_eq!(engine.scan_text_node(text), 0);
        assert!(engine.processed_text.contains(&text));

        let ops = engine.governor.operations();
        assert_eq!(engine.scan_text_node(text), 0);
        assert_eq!(engine.governor.operations(), ops);
    }

    #[test]
    fn test_whitespace_only_text_is_not_counted() {
        let mut doc = Document::new();
        doc.append_text(doc.body(), "   \n  ").unwrap();

        let engine = engine_with(doc, Config::default());
        assert_eq!(engine.governor.operations(), 0);
    }

    #[test]
    fn test_plain_runs_are_not_rescanned() {
        let mut doc = Document::new();
        doc.append_text(doc.body(), "x a@b.com y").unwrap();

        let mut engine = engine_with(doc, Config::default());
        let body = engine.document().body();
        let first = engine.document().children(body)[0];
        assert!(engine.processed_text.contains(&first));
        assert_eq!(engine.scan_text_node(first), 0);
    }

    #[test]
    fn test_partial_masking_at_span_limit() {
        let mut doc = Document::new();
        doc.append_text(doc.body(), "a@b.com c@d.com e@f.com").unwrap();

        let mut config = Config::default();
        config.governor.max_masked_spans = 2;
        let engine = engine_with(doc, config);

        assert_eq!(engine.status().count, 2);
        assert!(engine.status().suspended);

        let doc = engine.document();
        let tail = *doc.children(doc.body()).last().unwrap();
        assert_eq!(doc.text(tail), Some(" e@f.com"));
        assert!(!engine.processed_text.contains(&tail));
    }
}

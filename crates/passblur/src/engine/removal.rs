//! Undoing masks.

use tracing::{debug, info, warn};

use super::state::{
    TrackedElement, TrackedKind, FIELD_LABEL_ATTR, FIELD_ORIGINAL_ATTR, FIELD_STYLE_ATTR,
    OVERLAY_CLASS, PROCESSED_FIELD_CLASS, REVEALED_CLASS,
};
use super::{ClipboardWriter, Engine};
use crate::dom::NodeId;
use crate::error::Result;

impl<C: ClipboardWriter> Engine<C> {
    /// Remove every mask and restore the page.
    ///
    /// Masked spans become text nodes holding their original value. Masked
    /// fields get their exact pre-mask inline style back and lose every
    /// tracking attribute. All overlays are removed and all tracking state is
    /// cleared. Elements that cannot be restored are logged and skipped.
    ///
    /// Returns the number of elements that were tracked.
    pub fn remove_all_masks(&mut self) -> usize {
        let tracked = std::mem::take(&mut self.tracked);
        let count = tracked.len();

        for (anchor, element) in tracked {
            if let Err(err) = self.unmask(&element) {
                warn!(%anchor, %err, "Failed to restore masked element");
            }
        }

        let body = self.document.body();
        let orphans: Vec<NodeId> = self
            .document
            .descendants(body)
            .into_iter()
            .filter(|n| self.document.has_class(*n, OVERLAY_CLASS))
            .collect();
        for overlay in orphans {
            if let Err(err) = self.document.remove(overlay) {
                debug!(%overlay, %err, "Failed to remove orphan overlay");
            }
        }

        self.overlays.clear();
        self.processed_text.clear();
        self.state.clear();
        self.reveal.clear_hover();
        self.poll.forget_values();

        if count > 0 {
            info!(count, "Removed all masks");
        }
        count
    }

    fn unmask(&mut self, element: &TrackedElement) -> Result<()> {
        match &element.kind {
            TrackedKind::Span { wrapper, .. } => {
                if self.document.parent(*wrapper).is_none() {
                    return Ok(());
                }
                let text = self.document.create_text(&element.original);
                if let Err(err) = self.document.replace_with(*wrapper, &[text]) {
                    let _ = self.document.remove(text);
                    return Err(err.into());
                }
            }
            TrackedKind::Field {
                field,
                overlay,
                style_snapshot,
                ..
            } => {
                if self.document.contains(*overlay) {
                    self.document.remove(*overlay)?;
                }
                if self.document.contains(*field) {
                    self.restore_field(*field, style_snapshot.as_deref())?;
                }
            }
        }
        Ok(())
    }

    fn restore_field(&mut self, field: NodeId, style: Option<&str>) -> Result<()> {
        let doc = &mut self.document;
        match style {
            Some(style) => doc.set_attribute(field, "style", style)?,
            None => {
                doc.remove_attribute(field, "style")?;
            }
        }
        for attr in [FIELD_ORIGINAL_ATTR, FIELD_LABEL_ATTR, FIELD_STYLE_ATTR] {
            doc.remove_attribute(field, attr)?;
        }
        doc.remove_class(field, PROCESSED_FIELD_CLASS)?;
        doc.remove_class(field, REVEALED_CLASS)?;
        Ok(())
    }

    /// Drop tracking for elements the page has removed.
    ///
    /// Overlays left behind by a removed field are removed too.
    pub(super) fn prune_detached(&mut self) {
        let gone: Vec<NodeId> = self
            .tracked
            .keys()
            .copied()
            .filter(|anchor| !self.document.is_connected(*anchor))
            .collect();

        for anchor in gone {
            let Some(element) = self.tracked.remove(&anchor) else {
                continue;
            };
            if let Some(overlay) = element.overlay() {
                self.overlays.remove(&overlay);
                if self.document.contains(overlay) {
                    if let Err(err) = self.document.remove(overlay) {
                        debug!(%overlay, %err, "Failed to remove orphan overlay");
                    }
                }
            }
            self.state.forget(anchor);
            if self.reveal.hovered == Some(anchor) {
                self.reveal.hovered = None;
            }
            debug!(%anchor, label = element.label, "Masked element removed by page");
        }

        let doc = &self.document;
        self.processed_text.retain(|node| doc.contains(*node));
        self.poll.retain_live(doc);
    }
}

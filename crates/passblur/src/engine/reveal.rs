//! Reveal controller and copy-on-click.
//!
//! Each masked element is either hidden or revealed. Holding the reveal
//! modifier while the pointer is over a masked element reveals it; leaving
//! the element, releasing the modifier or losing window focus hides it
//! again. Clicking a masked element copies its original value.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::state::{TrackedKind, CLIPBOARD_BUFFER_CLASS, NOTIFICATION_CLASS, REVEALED_CLASS};
use super::{ClipboardWriter, Engine, EngineEvent, TimerKind};
use crate::config::Modifier;
use crate::dom::{Document, NodeId};
use crate::error::Result;

/// Text of the copy notification.
const NOTIFICATION_TEXT: &str = "✓ Copied!";

/// Vertical offset of the notification above the copied element.
const NOTIFICATION_OFFSET: f64 = 30.0;

/// Inline style of the hidden clipboard buffer.
const BUFFER_STYLE: &str = "position: fixed; left: -9999px; top: 0; opacity: 0;";

/// Input events a host delivers to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// The pointer entered `target`.
    PointerEnter {
        /// Element under the pointer.
        target: NodeId,
    },
    /// The pointer left `target` for `related`.
    PointerLeave {
        /// Element the pointer left.
        target: NodeId,
        /// Element the pointer moved to, if any.
        related: Option<NodeId>,
    },
    /// A modifier key was pressed.
    KeyDown(Modifier),
    /// A modifier key was released.
    KeyUp(Modifier),
    /// `target` was clicked.
    Click {
        /// Clicked element.
        target: NodeId,
    },
    /// `target` is about to receive focus.
    Focus {
        /// Element gaining focus.
        target: NodeId,
    },
    /// A text selection is starting in `target`.
    SelectStart {
        /// Element where the selection starts.
        target: NodeId,
    },
    /// The window lost focus.
    WindowBlur,
}

/// What the host should do with an event after the engine saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    /// The engine had no interest in the event.
    Ignored,
    /// The engine acted on the event; default handling may proceed.
    Handled,
    /// The engine consumed the event; the host must cancel its default
    /// action and stop propagation.
    PreventDefault,
}

#[derive(Debug, Default)]
pub(crate) struct RevealState {
    pub(crate) modifier_held: bool,
    pub(crate) hovered: Option<NodeId>,
}

impl RevealState {
    pub(crate) fn clear_hover(&mut self) {
        self.hovered = None;
    }
}

impl<C: ClipboardWriter> Engine<C> {
    /// Deliver a UI event.
    pub fn handle_event(&mut self, event: UiEvent) -> EventResponse {
        match event {
            UiEvent::PointerEnter { target } => {
                let Some(anchor) = self.tracked_anchor_for(target) else {
                    return EventResponse::Ignored;
                };
                self.reveal.hovered = Some(anchor);
                if self.reveal.modifier_held {
                    self.reveal_element(anchor);
                }
                EventResponse::Handled
            }
            UiEvent::PointerLeave { target, related } => {
                let Some(anchor) = self.tracked_anchor_for(target) else {
                    return EventResponse::Ignored;
                };
                // Moving between a field and its overlay, or within a wrapper,
                // is not leaving.
                if related.and_then(|r| self.tracked_anchor_for(r)) == Some(anchor) {
                    return EventResponse::Handled;
                }
                if self.reveal.hovered == Some(anchor) {
                    self.reveal.hovered = None;
                }
                self.hide_element(anchor);
                EventResponse::Handled
            }
            UiEvent::KeyDown(key) if key == self.config.reveal.modifier => {
                self.reveal.modifier_held = true;
                if let Some(anchor) = self.reveal.hovered {
                    self.reveal_element(anchor);
                }
                EventResponse::Handled
            }
            UiEvent::KeyUp(key) if key == self.config.reveal.modifier => {
                self.reveal.modifier_held = false;
                self.hide_all_revealed();
                EventResponse::Handled
            }
            UiEvent::KeyDown(_) | UiEvent::KeyUp(_) => EventResponse::Ignored,
            UiEvent::WindowBlur => {
                self.reveal.modifier_held = false;
                self.hide_all_revealed();
                EventResponse::Handled
            }
            UiEvent::Click { target } => {
                if let Some(anchor) = self.tracked_anchor_for(target) {
                    self.copy_value(anchor);
                    return EventResponse::PreventDefault;
                }
                if self.is_rescan_trigger(target) {
                    self.schedule_click_rescans();
                }
                EventResponse::Ignored
            }
            UiEvent::Focus { target } | UiEvent::SelectStart { target } => {
                if self.tracked_anchor_for(target).is_some() {
                    EventResponse::PreventDefault
                } else {
                    EventResponse::Ignored
                }
            }
        }
    }

    /// Check whether a tracked element is currently revealed.
    #[must_use]
    pub fn is_revealed(&self, anchor: NodeId) -> bool {
        self.tracked.get(&anchor).is_some_and(|t| t.revealed)
    }

    /// Hide every revealed element. Hidden elements are not touched.
    pub fn hide_all_revealed(&mut self) {
        let revealed: Vec<NodeId> = self
            .tracked
            .iter()
            .filter(|(_, t)| t.revealed)
            .map(|(anchor, _)| *anchor)
            .collect();
        for anchor in revealed {
            self.hide_element(anchor);
        }
    }

    fn reveal_element(&mut self, anchor: NodeId) {
        let Some(tracked) = self.tracked.get_mut(&anchor) else {
            return;
        };
        if tracked.revealed {
            return;
        }
        tracked.revealed = true;
        if let Err(err) = show(&mut self.document, &tracked.kind) {
            debug!(%anchor, %err, "Failed to reveal element");
        }
    }

    fn hide_element(&mut self, anchor: NodeId) {
        let Some(tracked) = self.tracked.get_mut(&anchor) else {
            return;
        };
        if !tracked.revealed {
            return;
        }
        tracked.revealed = false;
        if let Err(err) = conceal(&mut self.document, &tracked.kind) {
            debug!(%anchor, %err, "Failed to hide element");
        }
    }

    fn is_rescan_trigger(&self, target: NodeId) -> bool {
        self.document
            .closest(target, |n| {
                matches!(self.document.tag(n), Some("button" | "a"))
                    || self.document.attribute(n, "role") == Some("button")
            })
            .is_some()
    }

    fn schedule_click_rescans(&mut self) {
        if !self.is_active() {
            return;
        }
        self.scheduler
            .cancel_where(|kind| kind == TimerKind::DelayedFieldScan);
        for delay in self.config.click_rescan_delays() {
            self.scheduler
                .schedule(self.now + delay, TimerKind::DelayedFieldScan);
        }
    }

    /// Copy a tracked element's original value to the clipboard.
    fn copy_value(&mut self, anchor: NodeId) {
        let Some(tracked) = self.tracked.get(&anchor) else {
            return;
        };
        let original = tracked.original.clone();
        let category = tracked.category;
        let label = tracked.label;

        let copied = match self.clipboard.write_text(&original) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(%err, "Clipboard write failed, falling back to copy command");
                self.legacy_copy(&original)
            }
        };

        match copied {
            Ok(()) => {
                info!(label, "Copied masked value");
                self.show_notification(anchor);
                self.emit(EngineEvent::ValueCopied {
                    category,
                    label: label.to_string(),
                    at: Utc::now(),
                });
            }
            Err(err) => warn!(%err, label, "Could not copy masked value"),
        }
    }

    /// Copy through a temporary hidden textarea and the copy command.
    fn legacy_copy(&mut self, text: &str) -> Result<()> {
        let body = self.document.body();
        let buffer = self.document.append_element(
            body,
            "textarea",
            &[("class", CLIPBOARD_BUFFER_CLASS), ("style", BUFFER_STYLE)],
        )?;

        let copied = self.copy_through(buffer, text);

        self.document.clear_selection();
        if let Err(err) = self.document.remove(buffer) {
            debug!(%err, "Failed to remove clipboard buffer");
        }
        copied
    }

    fn copy_through(&mut self, buffer: NodeId, text: &str) -> Result<()> {
        self.document.set_value(buffer, text)?;
        let selected = self.document.select_contents(buffer)?;
        self.clipboard.exec_copy(&selected)?;
        Ok(())
    }

    fn show_notification(&mut self, anchor: NodeId) {
        let bounds = self.document.bounds(anchor);
        let style = format!(
            "position: absolute; left: {}px; top: {}px; z-index: 2147483647; opacity: 1; \
             transition: opacity 0.3s;",
            bounds.x,
            (bounds.y - NOTIFICATION_OFFSET).max(0.0)
        );

        let body = self.document.body();
        let created = self
            .document
            .append_element(
                body,
                "div",
                &[("class", NOTIFICATION_CLASS), ("style", style.as_str())],
            )
            .and_then(|note| {
                self.document.append_text(note, NOTIFICATION_TEXT)?;
                Ok(note)
            });

        match created {
            Ok(note) => {
                let fade_at = self.now + self.config.notification_fade();
                self.scheduler
                    .schedule(fade_at, TimerKind::NotificationFade(note));
            }
            Err(err) => debug!(%err, "Failed to show copy notification"),
        }
    }

    pub(super) fn fade_notification(&mut self, note: NodeId) {
        if !self.document.contains(note) {
            return;
        }
        let style = self
            .document
            .attribute(note, "style")
            .unwrap_or_default()
            .replace("opacity: 1", "opacity: 0");
        if let Err(err) = self.document.set_attribute(note, "style", &style) {
            debug!(%err, "Failed to fade copy notification");
        }
        let remove_at = self.now + self.config.notification_remove();
        self.scheduler
            .schedule(remove_at, TimerKind::NotificationRemove(note));
    }

    pub(super) fn remove_notification(&mut self, note: NodeId) {
        if self.document.contains(note) {
            if let Err(err) = self.document.remove(note) {
                debug!(%err, "Failed to remove copy notification");
            }
        }
    }
}

/// Unblur a masked element.
fn show(doc: &mut Document, kind: &TrackedKind) -> Result<()> {
    match kind {
        TrackedKind::Span {
            wrapper, blurred, ..
        } => {
            doc.add_class(*wrapper, REVEALED_CLASS)?;
            doc.remove_attribute(*blurred, "style")?;
        }
        TrackedKind::Field {
            field,
            overlay,
            style_snapshot,
            ..
        } => {
            match style_snapshot {
                Some(style) => doc.set_attribute(*field, "style", style)?,
                None => {
                    doc.remove_attribute(*field, "style")?;
                }
            }
            doc.add_class(*field, REVEALED_CLASS)?;
            doc.set_attribute(*overlay, "style", "display: none;")?;
        }
    }
    Ok(())
}

/// Put the mask back on a revealed element.
fn conceal(doc: &mut Document, kind: &TrackedKind) -> Result<()> {
    match kind {
        TrackedKind::Span {
            wrapper,
            blurred,
            masked_style,
        } => {
            doc.remove_class(*wrapper, REVEALED_CLASS)?;
            doc.set_attribute(*blurred, "style", masked_style)?;
        }
        TrackedKind::Field {
            field,
            overlay,
            masked_style,
            overlay_style,
            ..
        } => {
            doc.remove_class(*field, REVEALED_CLASS)?;
            doc.set_attribute(*field, "style", masked_style)?;
            doc.set_attribute(*overlay, "style", overlay_style)?;
        }
    }
    Ok(())
}

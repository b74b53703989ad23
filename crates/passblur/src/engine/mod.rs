//! The masking engine.
//!
//! [`Engine`] is the single context object that owns a page: the document,
//! the classifier, tracking state, the safety governor, timers and the
//! change watcher. The host drives it in three ways:
//!
//! - control calls: [`Engine::start`], [`Engine::set_enabled`],
//!   [`Engine::set_filters`], [`Engine::rescan`], [`Engine::status`]
//! - UI events through [`Engine::handle_event`]
//! - time through [`Engine::advance`], which delivers pending mutation
//!   records and fires due timers
//!
//! Control calls never fail. Per-element failures are logged and the
//! element is skipped.

mod clipboard;
mod field;
mod governor;
mod removal;
mod reveal;
mod scheduler;
mod state;
mod text;
mod watcher;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, Settings};
use crate::detection::{Category, Classifier, DetectionFilterSet};
use crate::dom::{Document, NodeId};

pub use clipboard::{ClipboardError, ClipboardWriter, MemoryClipboard, SystemClipboard};
pub use governor::SuspendReason;
pub use reveal::{EventResponse, UiEvent};
pub use scheduler::TimerId;
pub use state::{
    TrackedElement, TrackedKind, BLURRED_CLASS, CLIPBOARD_BUFFER_CLASS, FIELD_LABEL_ATTR,
    FIELD_ORIGINAL_ATTR, FIELD_STYLE_ATTR, NOTIFICATION_CLASS, OVERLAY_CLASS,
    PROCESSED_FIELD_CLASS, REVEALED_CLASS, SPAN_LABEL_ATTR, SPAN_ORIGINAL_ATTR, TOOLTIP_CLASS,
    WRAPPER_CLASS,
};

use governor::{Admission, Governor};
use reveal::RevealState;
use scheduler::{Scheduler, TimerKind};
use state::{ProcessingState, ENGINE_CLASSES};
use watcher::PollState;

/// Snapshot of the engine's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    /// The user-facing on/off switch.
    pub enabled: bool,
    /// Whether the governor has temporarily suspended masking.
    pub suspended: bool,
    /// Number of masked spans and fields currently tracked.
    pub count: usize,
}

/// Notifications sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The user copied a masked value.
    ValueCopied {
        /// Category of the copied value.
        category: Category,
        /// Label of the copied value.
        label: String,
        /// When the copy happened.
        at: DateTime<Utc>,
    },
    /// The governor suspended masking.
    Suspended {
        /// Which limit tripped.
        reason: SuspendReason,
    },
    /// Masking resumed after a suspension.
    Resumed,
}

/// Detects and masks sensitive values in a [`Document`].
#[derive(Debug)]
pub struct Engine<C: ClipboardWriter = SystemClipboard> {
    document: Document,
    classifier: Classifier,
    config: Config,
    clipboard: C,
    enabled: bool,
    now: Instant,
    governor: Governor,
    scheduler: Scheduler,
    state: ProcessingState,
    processed_text: HashSet<NodeId>,
    tracked: BTreeMap<NodeId, TrackedElement>,
    overlays: HashMap<NodeId, NodeId>,
    reveal: RevealState,
    poll: PollState,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl<C: ClipboardWriter> Engine<C> {
    /// Create an engine over a document.
    ///
    /// Nothing is scanned until [`start`](Self::start) is called.
    pub fn new(document: Document, config: Config, clipboard: C) -> Self {
        Self {
            classifier: Classifier::with_filters(config.protection.filters.clone()),
            enabled: config.protection.enabled,
            governor: Governor::new(&config.governor),
            document,
            config,
            clipboard,
            now: Instant::now(),
            scheduler: Scheduler::new(),
            state: ProcessingState::default(),
            processed_text: HashSet::new(),
            tracked: BTreeMap::new(),
            overlays: HashMap::new(),
            reveal: RevealState::default(),
            poll: PollState::default(),
            events: None,
        }
    }

    /// Run the initial sweep and arm the watcher, if enabled.
    pub fn start(&mut self) {
        if self.enabled {
            self.activate();
        } else {
            debug!("Engine started disabled");
        }
    }

    /// Turn masking on or off.
    ///
    /// Enabling sweeps the page and arms the watcher. Disabling removes
    /// every mask, tears the watcher down and clears any suspension.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        self.config.protection.enabled = enabled;
        if enabled {
            info!("Protection enabled");
            self.activate();
        } else {
            info!("Protection disabled");
            self.remove_all_masks();
            self.teardown_watcher();
            self.scheduler
                .cancel_where(|kind| kind == TimerKind::GovernorResume);
            self.governor.reset();
        }
    }

    /// Replace the category toggles.
    ///
    /// Existing masks are removed and the page is swept again, so newly
    /// disabled categories end up unmasked.
    pub fn set_filters(&mut self, filters: DetectionFilterSet) {
        self.store_filters(filters);
        if self.enabled {
            self.remove_all_masks();
            self.sweep();
        }
    }

    /// Remove every mask and sweep the page again.
    ///
    /// Returns the number of tracked elements afterwards.
    pub fn rescan(&mut self) -> usize {
        if !self.enabled {
            return 0;
        }
        self.remove_all_masks();
        self.sweep();
        let count = self.tracked.len();
        info!(count, "Rescan complete");
        count
    }

    /// Apply persisted settings.
    pub fn apply_settings(&mut self, settings: Settings) {
        let Settings { enabled, filters } = settings;
        if !enabled {
            self.set_enabled(false);
            self.store_filters(filters);
        } else if self.enabled {
            if filters != *self.classifier.filters() {
                self.set_filters(filters);
            }
        } else {
            self.store_filters(filters);
            self.set_enabled(true);
        }
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> Status {
        Status {
            enabled: self.enabled,
            suspended: self.governor.is_suspended(),
            count: self.tracked.len(),
        }
    }

    /// Move the engine clock to `now`.
    ///
    /// Pending mutation records are handled first, then every timer due at
    /// or before `now` fires in deadline order with the clock set to its
    /// deadline. Timers scheduled by those timers fire too if they fall
    /// within `now`.
    pub fn advance(&mut self, now: Instant) {
        self.process_records();
        while let Some((deadline, kind)) = self.scheduler.pop_due(now) {
            self.now = self.now.max(deadline);
            self.fire(kind);
        }
        self.now = self.now.max(now);
    }

    /// Subscribe to engine events. Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// The engine clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.now
    }

    /// The earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// The page.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The page, for host edits. Edits are seen by the watcher on the next
    /// [`advance`](Self::advance).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The clipboard.
    #[must_use]
    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The classifier.
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// The tracking entry keyed by a wrapper span or masked field.
    #[must_use]
    pub fn tracked(&self, anchor: NodeId) -> Option<&TrackedElement> {
        self.tracked.get(&anchor)
    }

    /// All tracked elements, in node order.
    pub fn tracked_elements(&self) -> impl Iterator<Item = &TrackedElement> {
        self.tracked.values()
    }

    /// Give the document back, dropping all engine state.
    pub fn into_document(self) -> Document {
        self.document
    }

    fn activate(&mut self) {
        self.sweep();
        self.arm_watcher();
        info!(count = self.tracked.len(), "Initial sweep complete");
    }

    fn store_filters(&mut self, filters: DetectionFilterSet) {
        self.config.protection.filters = filters.clone();
        self.classifier.set_filters(filters);
    }

    /// Masking runs only while enabled and not suspended.
    fn is_active(&self) -> bool {
        self.enabled && !self.governor.is_suspended()
    }

    /// Count one classification operation against the governor.
    fn admit_operation(&mut self) -> bool {
        match self.governor.admit(self.now) {
            Admission::Allowed => true,
            Admission::Suspended => false,
            Admission::Overloaded => {
                warn!(
                    limit = self.config.governor.max_operations_per_second,
                    cooldown_ms = self.config.governor.overload_cooldown_ms,
                    "Too many operations, suspending protection"
                );
                self.suspend(SuspendReason::Overload);
                false
            }
        }
    }

    fn suspend(&mut self, reason: SuspendReason) {
        let cooldown = match reason {
            SuspendReason::Overload => self.config.overload_cooldown(),
            SuspendReason::SpanLimit => self.config.span_limit_cooldown(),
        };
        let until = self.now + cooldown;
        self.governor.suspend(reason, until);
        self.scheduler.schedule(until, TimerKind::GovernorResume);
        self.emit(EngineEvent::Suspended { reason });
    }

    fn resume(&mut self) {
        if let Some((reason, _)) = self.governor.suspension() {
            self.governor.resume();
            // Fields skipped while suspended are picked up by the next poll.
            self.poll.forget_values();
            info!(%reason, "Protection resumed");
            self.emit(EngineEvent::Resumed);
        }
    }

    fn fire(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::GovernorResume => self.resume(),
            TimerKind::FastPoll | TimerKind::SteadyPoll => self.poll_tick(kind),
            TimerKind::DelayedFieldScan => {
                if self.is_active() {
                    self.sweep_fields();
                }
            }
            TimerKind::NotificationFade(node) => self.fade_notification(node),
            TimerKind::NotificationRemove(node) => self.remove_notification(node),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening.
            let _ = tx.send(event);
        }
    }

    /// Check whether a node is, or is inside, an element the engine created.
    fn is_engine_node(&self, node: NodeId) -> bool {
        self.document
            .closest(node, |n| {
                ENGINE_CLASSES
                    .iter()
                    .any(|class| self.document.has_class(n, class))
            })
            .is_some()
    }

    /// Map any node inside a wrapper, field or overlay to its tracking key.
    fn tracked_anchor_for(&self, node: NodeId) -> Option<NodeId> {
        let hit = self.document.closest(node, |n| {
            self.tracked.contains_key(&n) || self.overlays.contains_key(&n)
        })?;
        Some(self.overlays.get(&hit).copied().unwrap_or(hit))
    }

    fn span_count(&self) -> usize {
        self.tracked.values().filter(|t| t.is_span()).count()
    }
}

impl Engine<SystemClipboard> {
    /// Create an engine that copies to the system clipboard.
    #[must_use]
    pub fn with_system_clipboard(document: Document, config: Config) -> Self {
        Self::new(document, config, SystemClipboard::new())
    }
}

//! Change watcher.
//!
//! Two paths feed fields into the classifier after the initial sweep:
//!
//! - the mutation observer, covering inserted fields and `pre`/`code`
//!   blocks, text added to an existing block, and `value` attribute changes
//! - a value poller for autofill that changes the live value without any
//!   observable mutation. Each tick samples the next window of fields, so
//!   large forms are covered over several ticks.
//!
//! Records caused by the engine's own edits are dropped before dispatch.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::scheduler::TimerId;
use super::state::PROCESSED_FIELD_CLASS;
use super::{ClipboardWriter, Engine, TimerKind};
use crate::dom::{Document, MutationRecord, NodeId, ObserverOptions};

/// Attributes the observer reports.
const WATCHED_ATTRIBUTES: [&str; 1] = ["value"];

/// Last-seen field values and the poll timer.
#[derive(Debug, Default)]
pub(crate) struct PollState {
    last_seen: HashMap<NodeId, blake3::Hash>,
    fast_ticks_left: u32,
    cursor: usize,
    timer: Option<TimerId>,
}

impl PollState {
    /// Forget every last-seen value, so the next tick treats all fields as
    /// changed.
    pub(crate) fn forget_values(&mut self) {
        self.last_seen.clear();
    }

    /// Drop values of nodes that no longer exist.
    pub(crate) fn retain_live(&mut self, doc: &Document) {
        self.last_seen.retain(|node, _| doc.contains(*node));
    }

    /// Record a field's value. Returns `true` if it differs from the last
    /// one seen.
    fn observe_value(&mut self, node: NodeId, value: &str) -> bool {
        let digest = blake3::hash(value.as_bytes());
        self.last_seen.insert(node, digest) != Some(digest)
    }

    /// Pick up to `limit` of `fields`, starting at the cursor and wrapping
    /// around, then move the cursor past them.
    fn next_window<T: Copy>(&mut self, fields: &[T], limit: usize) -> Vec<T> {
        if fields.len() <= limit {
            self.cursor = 0;
            return fields.to_vec();
        }
        let start = self.cursor % fields.len();
        self.cursor = (start + limit) % fields.len();
        fields
            .iter()
            .cycle()
            .skip(start)
            .take(limit)
            .copied()
            .collect()
    }
}

fn observer_options() -> ObserverOptions {
    ObserverOptions {
        child_list: true,
        subtree: true,
        attributes: true,
        attribute_filter: WATCHED_ATTRIBUTES.iter().map(|a| (*a).to_string()).collect(),
    }
}

impl<C: ClipboardWriter> Engine<C> {
    /// Observe the body and start the fast poller.
    pub(super) fn arm_watcher(&mut self) {
        let body = self.document.body();
        self.document.observe(body, observer_options());

        self.scheduler.cancel_where(TimerKind::is_poll);
        self.poll = PollState {
            fast_ticks_left: self.config.watcher.fast_ticks,
            ..PollState::default()
        };
        self.schedule_poll();
        debug!(
            fast_ticks = self.poll.fast_ticks_left,
            "Change watcher armed"
        );
    }

    /// Disconnect the observer and cancel the poller and delayed scans.
    pub(super) fn teardown_watcher(&mut self) {
        self.document.disconnect();
        if let Some(timer) = self.poll.timer.take() {
            self.scheduler.cancel(timer);
        }
        self.scheduler
            .cancel_where(|kind| kind == TimerKind::DelayedFieldScan);
        self.poll = PollState::default();
        debug!("Change watcher torn down");
    }

    /// Handle the mutation records queued since the last call.
    ///
    /// Removals are always pruned from tracking. Inserted field candidates,
    /// blocks that gained children and changed `value` attributes are
    /// classified only while masking is active; records seen during a
    /// suspension are dropped.
    pub(super) fn process_records(&mut self) {
        let records = self.document.take_records();
        if records.is_empty() {
            return;
        }

        let mut removed_any = false;
        let mut dropped = 0usize;
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for record in &records {
            if self.is_self_mutation(record) {
                dropped += 1;
                continue;
            }
            removed_any |= !record.removed_nodes().is_empty();

            match record.attribute_name() {
                Some(_) => {
                    if self.is_input_like(record.target) && seen.insert(record.target) {
                        candidates.push(record.target);
                    }
                }
                None => {
                    if record.added_nodes().is_empty() {
                        continue;
                    }
                    let block = self
                        .document
                        .closest(record.target, |n| self.is_field_candidate(n));
                    if let Some(block) = block {
                        if seen.insert(block) {
                            candidates.push(block);
                        }
                    }
                    for &added in record.added_nodes() {
                        let subtree =
                            std::iter::once(added).chain(self.document.descendants(added));
                        for node in subtree {
                            if self.is_field_candidate(node) && seen.insert(node) {
                                candidates.push(node);
                            }
                        }
                    }
                }
            }
        }
        trace!(
            records = records.len(),
            dropped,
            candidates = candidates.len(),
            "Mutation batch"
        );

        if removed_any {
            self.prune_detached();
        }
        for node in candidates {
            if !self.is_active() {
                break;
            }
            self.scan_field(node);
        }
    }

    /// Records targeting an engine element, or adding one.
    fn is_self_mutation(&self, record: &MutationRecord) -> bool {
        self.is_engine_node(record.target)
            || record
                .added_nodes()
                .iter()
                .any(|node| self.is_engine_node(*node))
    }

    /// One poller tick. Reschedules itself.
    pub(super) fn poll_tick(&mut self, kind: TimerKind) {
        self.poll.timer = None;
        if kind == TimerKind::FastPoll {
            self.poll.fast_ticks_left = self.poll.fast_ticks_left.saturating_sub(1);
            if self.poll.fast_ticks_left == 0 {
                debug!("Fast poll window over, switching to steady polling");
            }
        }
        if !self.enabled {
            return;
        }
        if self.is_active() {
            let masked = self.poll_fields();
            if masked > 0 {
                debug!(masked, "Poller masked changed fields");
            }
        }
        self.schedule_poll();
    }

    fn schedule_poll(&mut self) {
        let (delay, kind) = if self.poll.fast_ticks_left > 0 {
            (self.config.fast_interval(), TimerKind::FastPoll)
        } else {
            (self.config.steady_interval(), TimerKind::SteadyPoll)
        };
        self.poll.timer = Some(self.scheduler.schedule(self.now + delay, kind));
    }

    /// Sample the next window of unmasked input-like fields and classify the
    /// ones whose value changed. Returns the number masked.
    fn poll_fields(&mut self) -> usize {
        let body = self.document.body();
        let eligible: Vec<NodeId> = self
            .document
            .descendants(body)
            .into_iter()
            .filter(|n| {
                self.is_input_like(*n)
                    && !self.document.has_class(*n, PROCESSED_FIELD_CLASS)
                    && !self.is_engine_node(*n)
            })
            .collect();
        let fields = self
            .poll
            .next_window(&eligible, self.config.watcher.max_polled_fields);

        let mut masked = 0;
        for field in fields {
            if !self.is_active() {
                break;
            }
            let value = self
                .document
                .value(field)
                .or_else(|| self.document.attribute(field, "value"))
                .unwrap_or_default()
                .to_string();
            let changed = self.poll.observe_value(field, &value);
            if changed && !value.is_empty() && self.scan_field(field) {
                masked += 1;
            }
        }
        masked
    }
}

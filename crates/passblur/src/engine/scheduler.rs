//! Engine-owned timers.
//!
//! Timers are plain data: the engine fires them when the host advances the
//! clock past their deadline. Each scheduled timer has a [`TimerId`] that
//! cancels it.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::dom::NodeId;

/// Cancel handle for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// End a governor suspension.
    GovernorResume,
    /// A value poll during the initial fast window.
    FastPoll,
    /// A value poll at the steady interval.
    SteadyPoll,
    /// A field-only rescan after a click on a button or link.
    DelayedFieldScan,
    /// Fade out a copy notification.
    NotificationFade(NodeId),
    /// Remove a faded copy notification.
    NotificationRemove(NodeId),
}

impl TimerKind {
    pub(crate) fn is_poll(self) -> bool {
        matches!(self, Self::FastPoll | Self::SteadyPoll)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    next_id: u64,
    queue: BTreeMap<(Instant, u64), TimerKind>,
    deadlines: HashMap<u64, Instant>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn schedule(&mut self, at: Instant, kind: TimerKind) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((at, id), kind);
        self.deadlines.insert(id, at);
        TimerId(id)
    }

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    pub(crate) fn cancel(&mut self, timer: TimerId) -> bool {
        match self.deadlines.remove(&timer.0) {
            Some(at) => self.queue.remove(&(at, timer.0)).is_some(),
            None => false,
        }
    }

    /// Cancel every timer accepted by the predicate.
    pub(crate) fn cancel_where(&mut self, mut predicate: impl FnMut(TimerKind) -> bool) {
        let doomed: Vec<(Instant, u64)> = self
            .queue
            .iter()
            .filter(|(_, kind)| predicate(**kind))
            .map(|(key, _)| *key)
            .collect();
        for key in doomed {
            self.queue.remove(&key);
            self.deadlines.remove(&key.1);
        }
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(Instant, TimerKind)> {
        let (&(at, id), _) = self.queue.first_key_value()?;
        if at > now {
            return None;
        }
        self.deadlines.remove(&id);
        self.queue.remove(&(at, id)).map(|kind| (at, kind))
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    #[cfg(test)]
    pub(crate) fn is_scheduled(&self, timer: TimerId) -> bool {
        self.deadlines.contains_key(&timer.0)
    }

    #[cfg(test)]
    pub(crate) fn count_where(&self, mut predicate: impl FnMut(TimerKind) -> bool) -> usize {
        self.queue.values().filter(|kind| predicate(**kind)).count()
    }
}

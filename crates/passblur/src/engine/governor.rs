//! Safety governor.
//!
//! Two limits keep the engine from running away on hostile or very busy
//! pages: a rolling one-second budget of classification operations, and a
//! ceiling on live masked spans. Tripping either suspends masking for a
//! cooldown; the page is left as it is while suspended.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::GovernorConfig;

/// Length of the rate-limit window.
const WINDOW: Duration = Duration::from_secs(1);

/// Why the engine suspended itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendReason {
    /// Too many classification operations within one second.
    Overload,
    /// The live masked span ceiling was reached.
    SpanLimit,
}

impl fmt::Display for SuspendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overload => write!(f, "overload"),
            Self::SpanLimit => write!(f, "span limit"),
        }
    }
}

/// Outcome of asking the governor for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Allowed,
    /// Already suspended.
    Suspended,
    /// This operation pushed the window over the limit.
    Overloaded,
}

#[derive(Debug, Clone, Copy)]
struct Suspension {
    reason: SuspendReason,
    until: Instant,
}

#[derive(Debug)]
pub(crate) struct Governor {
    max_operations: usize,
    max_spans: usize,
    window: VecDeque<Instant>,
    suspension: Option<Suspension>,
}

impl Governor {
    pub(crate) fn new(config: &GovernorConfig) -> Self {
        Self {
            max_operations: usize::try_from(config.max_operations_per_second)
                .unwrap_or(usize::MAX),
            max_spans: config.max_masked_spans,
            window: VecDeque::new(),
            suspension: None,
        }
    }

    /// Count one operation at `now`.
    pub(crate) fn admit(&mut self, now: Instant) -> Admission {
        if self.suspension.is_some() {
            return Admission::Suspended;
        }
        while self
            .window
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= WINDOW)
        {
            self.window.pop_front();
        }
        self.window.push_back(now);
        if self.window.len() > self.max_operations {
            Admission::Overloaded
        } else {
            Admission::Allowed
        }
    }

    /// Spans that may still be created with `live` spans on the page.
    pub(crate) fn span_capacity(&self, live: usize) -> usize {
        self.max_spans.saturating_sub(live)
    }

    pub(crate) fn suspend(&mut self, reason: SuspendReason, until: Instant) {
        self.suspension = Some(Suspension { reason, until });
    }

    /// End a suspension and start a fresh window.
    pub(crate) fn resume(&mut self) {
        self.suspension = None;
        self.window.clear();
    }

    pub(crate) fn reset(&mut self) {
        self.resume();
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspension.is_some()
    }

    pub(crate) fn suspension(&self) -> Option<(SuspendReason, Instant)> {
        self.suspension.map(|s| (s.reason, s.until))
    }

    pub(crate) fn operations(&self) -> usize {
        self.window.len()
    }
}

//! Tokio driver for the engine clock.
//!
//! The engine never reads the wall clock on its own; something has to call
//! [`Engine::advance`]. [`drive`] does that on a fixed tick until its
//! [`DriverHandle`] is stopped or an optional time limit elapses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use crate::engine::{ClipboardWriter, Engine};

/// Default driver tick. Matches the shortest click rescan delay.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// A handle to stop a running driver.
///
/// This is a lightweight, cloneable handle that can be moved to other tasks.
#[derive(Debug, Clone, Default)]
pub struct DriverHandle {
    stop_signal: Arc<AtomicBool>,
}

impl DriverHandle {
    /// Create a new driver handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the driver to stop.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    /// Reset the stop signal.
    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }
}

/// Advance `engine` every `tick` until `handle` is stopped or `limit` has
/// elapsed.
///
/// The engine clock moves by the time elapsed on the tokio clock, starting
/// from the engine's current time, so paused-time tests are deterministic.
/// Returns the number of ticks delivered.
pub async fn drive<C: ClipboardWriter>(
    engine: &mut Engine<C>,
    tick: Duration,
    handle: &DriverHandle,
    limit: Option<Duration>,
) -> u64 {
    let origin = engine.now();
    let started = Instant::now();
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(tick_ms = tick.as_millis(), ?limit, "Starting engine driver");

    let mut ticks = 0;
    loop {
        ticker.tick().await;
        if handle.should_stop() {
            break;
        }

        let elapsed = started.elapsed();
        engine.advance(origin + elapsed);
        ticks += 1;

        if limit.is_some_and(|limit| elapsed >= limit) {
            break;
        }
    }

    debug!(ticks, "Engine driver stopped");
    ticks
}

/// Drive `engine` with [`DEFAULT_TICK`] for `duration`.
pub async fn run_for<C: ClipboardWriter>(engine: &mut Engine<C>, duration: Duration) -> u64 {
    drive(engine, DEFAULT_TICK, &DriverHandle::new(), Some(duration)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dom::Document;
    use crate::engine::MemoryClipboard;

    fn engine() -> Engine<MemoryClipboard> {
        let mut engine = Engine::new(Document::new(), Config::default(), MemoryClipboard::new());
        engine.start();
        engine
    }

    #[test]
    fn test_driver_handle_stop_and_reset() {
        let handle = DriverHandle::new();
        assert!(!handle.should_stop());

        handle.stop();
        assert!(handle.should_stop());

        handle.reset();
        assert!(!handle.should_stop());
    }

    #[test]
    fn test_driver_handle_clone_shares_signal() {
        let handle1 = DriverHandle::new();
        let handle2 = handle1.clone();

        handle1.stop();
        assert!(handle2.should_stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_for_advances_engine_clock() {
        let mut engine = engine();
        let origin = engine.now();

        let ticks = run_for(&mut engine, Duration::from_millis(100)).await;

        assert_eq!(ticks, 11);
        assert_eq!(engine.now(), origin + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_delivers_poller_ticks() {
        let mut engine = engine();
        let body = engine.document().body();
        let input = engine
            .document_mut()
            .append_element(body, "input", &[])
            .unwrap();
        engine.advance(engine.now());
        engine.document_mut().set_value(input, "a@b.com").unwrap();

        run_for(&mut engine, Duration::from_millis(60)).await;

        assert!(engine.tracked(input).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_handle_ends_drive() {
        let mut engine = engine();
        let handle = DriverHandle::new();
        handle.stop();

        let ticks = drive(&mut engine, DEFAULT_TICK, &handle, None).await;
        assert_eq!(ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_another_task() {
        let mut engine = engine();
        let handle = DriverHandle::new();

        let stopper = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(55)).await;
            stopper.stop();
        });

        let ticks = drive(&mut engine, DEFAULT_TICK, &handle, None).await;
        assert!((5..=7).contains(&ticks));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timer engine for the session's elapsed clock.
//!
//! Elapsed time is always recomputed as `now - anchor`; nothing is
//! accumulated. A suspended process, a dropped tick, or a stale cache
//! therefore never skews the displayed value: the next read is simply
//! correct again.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Elapsed seconds between `anchor` and `now`; zero if the anchor lies ahead.
pub fn elapsed_between(anchor: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - anchor).num_seconds().max(0) as u64
}

/// The anchored session clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElapsedClock {
    anchor: Option<DateTime<Utc>>,
}

impl ElapsedClock {
    pub fn anchored_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor: Some(anchor),
        }
    }

    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: DateTime<Utc>) {
        self.anchor = Some(anchor);
    }

    pub fn clear(&mut self) {
        self.anchor = None;
    }

    /// Elapsed whole seconds at `now`; zero when not anchored.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        self.anchor.map_or(0, |a| elapsed_between(a, now))
    }
}

/// Periodically republish elapsed seconds for the current anchor.
///
/// Each tick recomputes from the anchor; missed ticks are skipped, not
/// replayed. Anchor changes are picked up on the next tick. The task ends
/// when the anchor sender is dropped.
pub fn spawn_ticker(
    clock: Arc<dyn Clock>,
    mut anchor: watch::Receiver<Option<DateTime<Utc>>>,
    period: Duration,
) -> (watch::Receiver<u64>, JoinHandle<()>) {
    let initial = anchor
        .borrow()
        .map_or(0, |a| elapsed_between(a, clock.now()));
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = anchor.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let elapsed = anchor
                .borrow()
                .map_or(0, |a| elapsed_between(a, clock.now()));
            tx.send_replace(elapsed);
        }

        tracing::debug!("Elapsed ticker stopped");
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_elapsed_is_wall_clock_difference() {
        let clock = ManualClock::new(t0());
        let timer = ElapsedClock::anchored_at(clock.now());

        clock.advance(chrono::Duration::seconds(3));
        assert_eq!(timer.elapsed_at(clock.now()), 3);

        // Suspended for 10 seconds with no ticks observed.
        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(timer.elapsed_at(clock.now()), 13);
    }

    #[test]
    fn test_unanchored_and_future_anchor_read_zero() {
        assert_eq!(ElapsedClock::default().elapsed_at(t0()), 0);

        let timer = ElapsedClock::anchored_at(t0() + chrono::Duration::seconds(30));
        assert_eq!(timer.elapsed_at(t0()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_recomputes_after_dropped_ticks() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (_anchor_tx, anchor_rx) = watch::channel(Some(t0()));
        let (mut elapsed, _handle) =
            spawn_ticker(clock.clone(), anchor_rx, Duration::from_secs(1));
        assert_eq!(*elapsed.borrow_and_update(), 0);

        // Simulated suspension: wall clock jumps 10s before the runtime gets
        // to run a single tick.
        clock.advance(chrono::Duration::seconds(10));
        elapsed.changed().await.unwrap();

        assert_eq!(*elapsed.borrow_and_update(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_follows_anchor_changes() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (anchor_tx, anchor_rx) = watch::channel(None);
        let (mut elapsed, _handle) =
            spawn_ticker(clock.clone(), anchor_rx, Duration::from_secs(1));
        assert_eq!(*elapsed.borrow(), 0);

        anchor_tx.send_replace(Some(t0() - chrono::Duration::seconds(125)));
        elapsed.changed().await.unwrap();

        assert_eq!(*elapsed.borrow_and_update(), 125);
    }
}

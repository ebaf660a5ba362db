//! Tick sources for the scheduler loop.
//!
//! Production uses wall-clock intervals; tests drive cycles by hand.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Something that fires periodically.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. Returns `false` once the source is exhausted.
    async fn tick(&mut self) -> bool;
}

/// Wall-clock ticker backed by [`tokio::time::Interval`].
///
/// Ticks that would pile up behind a slow cycle are skipped, not bursted.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Fires immediately, then every `period`.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    /// First tick after one full `period`.
    pub fn delayed(period: Duration) -> Self {
        Self::starting_at(Instant::now() + period, period)
    }

    fn starting_at(start: Instant, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker fired explicitly through a [`ManualTickHandle`].
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sender half of a [`ManualTicker`]. Dropping it ends the ticker.
#[derive(Clone)]
pub struct ManualTickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTickHandle {
    /// Fire one tick. Returns `false` if the ticker is gone.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Create a manually driven ticker.
pub fn manual() -> (ManualTickHandle, ManualTicker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ManualTickHandle { tx }, ManualTicker { rx })
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

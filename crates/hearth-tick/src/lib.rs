//! Fixed-interval tick scheduler for Hearth.
//!
//! Drives the recurring server loops: the position tick (every 50 ms by
//! default) and the persistence flush (every few minutes). Each loop owns
//! one [`TickScheduler`] and waits on it inside its `tokio::select!`:
//!
//! ```ignore
//! let mut ticks = TickScheduler::every(Duration::from_millis(50));
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = ticks.wait_for_tick() => players.tick(speed, &hub).await,
//!     }
//! }
//! ```
//!
//! A tick that wakes up late never fires the missed ticks: the schedule
//! restarts one interval after the late tick. Work that takes longer than
//! the interval therefore slows the loop down instead of piling up.
//!
//! A config with no interval never fires; [`TickScheduler::wait_for_tick`]
//! pends forever, which lets a disabled loop sit in a `select!` unchanged.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Configuration for a [`TickScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickConfig {
    /// Time between ticks. `None` disables the scheduler.
    pub interval: Option<Duration>,
    /// Upper bound of a random delay added to the first tick so loops
    /// started together don't fire in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: None,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// A config that ticks every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }

    /// A config that never ticks.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A zero interval means disabled; anything shorter than
    /// [`Self::MIN_INTERVAL`] is raised to it.
    pub fn validated(mut self) -> Self {
        self.interval = match self.interval {
            Some(d) if d.is_zero() => None,
            Some(d) if d < Self::MIN_INTERVAL => {
                warn!(
                    interval_us = d.as_micros() as u64,
                    "tick interval below minimum, clamping"
                );
                Some(Self::MIN_INTERVAL)
            }
            other => other,
        };
        self
    }
}

/// A fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    pub dt: Duration,
    /// The tick fired more than a tenth of an interval late.
    pub overrun: bool,
    /// Whole intervals that passed without a tick because of the delay.
    pub ticks_skipped: u64,
}

/// Fixed-interval tick scheduler.
#[derive(Debug)]
pub struct TickScheduler {
    interval: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one interval (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let next_tick = config.interval.map(|interval| {
            let max_jitter = config.initial_jitter.as_micros() as u64;
            let jitter = if max_jitter > 0 {
                Duration::from_micros(rand::rng().random_range(0..max_jitter))
            } else {
                Duration::ZERO
            };
            Instant::now() + interval + jitter
        });

        match config.interval {
            Some(interval) => debug!(
                interval_ms = interval.as_secs_f64() * 1000.0,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created disabled"),
        }

        Self {
            interval: config.interval,
            tick_count: 0,
            next_tick,
        }
    }

    /// A scheduler that ticks every `interval` with the default jitter. A
    /// zero interval gives a disabled scheduler.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Waits until the next tick is due.
    ///
    /// A disabled scheduler pends forever; `tokio::select!` keeps serving
    /// its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) => (next, interval),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / interval.as_nanos()) as u64
        } else {
            0
        };
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = Some(now + interval);

        trace!(tick = self.tick_count, overrun, "tick fired");
        TickInfo {
            tick: self.tick_count,
            dt: interval,
            overrun,
            ticks_skipped,
        }
    }

    /// `true` if the scheduler never fires.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

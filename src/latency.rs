//! Latency injection.
//!
//! Simulated network hops, staggered starts and DB writes all go through a
//! [`LatencyModel`]. [`SleepLatency`] blocks the calling worker thread for the
//! drawn duration; [`SyntheticLatency`] returns immediately and only accounts
//! for the duration, which keeps tests fast and their timings deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Inclusive millisecond range a delay is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// `[0, max_ms]`, used for the start jitter.
    pub const fn up_to(max_ms: u64) -> Self {
        Self { min_ms: 0, max_ms }
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }
}

impl std::fmt::Display for DelayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}ms", self.min_ms, self.max_ms)
    }
}

pub trait LatencyModel: Send + Sync {
    /// Spend `delay` and return the duration actually spent.
    fn wait(&self, delay: Duration) -> Duration;

    /// Whether [`wait`](Self::wait) really blocks. When it does not, callers
    /// add the returned durations to their own wall-clock measurement.
    fn blocks(&self) -> bool;
}

/// Real blocking sleep on the worker thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SleepLatency;

impl LatencyModel for SleepLatency {
    fn wait(&self, delay: Duration) -> Duration {
        if delay.is_zero() {
            return Duration::ZERO;
        }
        let t0 = Instant::now();
        std::thread::sleep(delay);
        t0.elapsed()
    }

    fn blocks(&self) -> bool {
        true
    }
}

/// Non-blocking model that records every requested delay.
#[derive(Debug, Default)]
pub struct SyntheticLatency {
    waits: AtomicU64,
    total_ns: AtomicU64,
}

impl SyntheticLatency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `wait` calls seen so far.
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }

    /// Sum of all durations handed to `wait`.
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Relaxed))
    }
}

impl LatencyModel for SyntheticLatency {
    fn wait(&self, delay: Duration) -> Duration {
        self.waits.fetch_add(1, Ordering::Relaxed);
        let ns = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .total_ns
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| Some(t.saturating_add(ns)));
        delay
    }

    fn blocks(&self) -> bool {
        false
    }
}

/// Per-node stopwatch that folds in non-blocking latency.
pub(crate) struct NodeClock<'a> {
    latency: &'a dyn LatencyModel,
    start: Instant,
    synthetic: Duration,
}

impl<'a> NodeClock<'a> {
    pub(crate) fn start(latency: &'a dyn LatencyModel) -> Self {
        Self {
            latency,
            start: Instant::now(),
            synthetic: Duration::ZERO,
        }
    }

    pub(crate) fn wait(&mut self, delay: Duration) {
        let spent = self.latency.wait(delay);
        if !self.latency.blocks() {
            self.synthetic = self.synthetic.saturating_add(spent);
        }
    }

    /// Saturates at `u64::MAX` microseconds.
    pub(crate) fn elapsed_us(&self) -> u64 {
        let total = self.start.elapsed().saturating_add(self.synthetic);
        u64::try_from(total.as_micros()).unwrap_or(u64::MAX)
    }
}

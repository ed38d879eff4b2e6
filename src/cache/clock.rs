//! Clock Module
//!
//! Time source for expiry decisions. Expiry instants are stored as milliseconds
//! on the clock's own timeline, so only differences between readings matter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// == Clock Trait ==
/// A monotonic millisecond clock.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed on this clock's timeline.
    fn now_ms(&self) -> u64;
}

// == System Clock ==
/// Monotonic clock anchored at its own creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// == Mock Clock ==
/// Manually driven clock for tests and simulations.
///
/// Share it with the store through an `Arc` and move time with [`advance`](Self::advance).
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicU64,
}

impl MockClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Moves time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

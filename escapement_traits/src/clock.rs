use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Microsecond reference clock abstraction.
///
/// - now_us(): monotonic microseconds since the clock's own origin
/// - sleep(): waits for the provided duration (implementations may simulate)
/// - us_since(): helper to compute elapsed microseconds from an earlier reading
pub trait Clock {
    fn now_us(&self) -> u64;
    fn sleep(&self, d: Duration);

    /// Microseconds elapsed since `earlier`, saturating at 0 on underflow.
    fn us_since(&self, earlier: u64) -> u64 {
        self.now_us().saturating_sub(earlier)
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time only moves when advanced.
///
/// now_us() = offset
/// sleep(d) advances internal time by d without actually sleeping.
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    offset_us: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        let _ = self
            .offset_us
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(cur.saturating_add(us))
            });
    }

    /// Set the absolute time in microseconds.
    pub fn set_us(&self, us: u64) {
        self.offset_us.store(us, Ordering::Relaxed);
    }
}

impl Clock for VirtualClock {
    fn now_us(&self) -> u64 {
        self.offset_us.load(Ordering::Relaxed)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

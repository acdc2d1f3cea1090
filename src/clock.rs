//! Time sources.
//!
//! The scheduler never reads the system clock itself; it samples whatever
//! [`Clock`] it was built with. Readings are nanoseconds since an arbitrary,
//! fixed epoch and must not go backwards for the life of one scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync + 'static {
    /// Current reading, or `None` if the clock cannot be read.
    fn now_ns(&self) -> Option<u64>;
}

impl<C: Clock> Clock for Arc<C> {
    #[inline]
    fn now_ns(&self) -> Option<u64> {
        (**self).now_ns()
    }
}

/// [`Instant`]-based clock counting from its own construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn with_epoch(epoch: Instant) -> Self {
        Self { epoch }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ns(&self) -> Option<u64> {
        u64::try_from(self.epoch.elapsed().as_nanos()).ok()
    }
}

/// Wall clock in nanoseconds since the UNIX epoch.
///
/// Not monotonic across system clock adjustments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ns(&self) -> Option<u64> {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        u64::try_from(since_epoch.as_nanos()).ok()
    }
}

/// Hand-driven clock.
///
/// Clones share the same reading. Useful for deterministic firing and for
/// simulating an unreadable clock via [`ManualClock::set_available`].
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<ManualInner>,
}

#[derive(Debug)]
struct ManualInner {
    now_ns: AtomicU64,
    unavailable: AtomicBool,
}

impl Default for ManualInner {
    fn default() -> Self {
        Self {
            now_ns: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        let clock = Self::default();
        clock.set(start_ns);
        clock
    }

    pub fn set(&self, now_ns: u64) {
        self.inner.now_ns.store(now_ns, Ordering::SeqCst);
    }

    /// Move the clock forward and return the new reading.
    pub fn advance(&self, by: Duration) -> u64 {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let prev = self
            .inner
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            })
            .unwrap_or_else(|now| now);
        prev.saturating_add(by)
    }

    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ns(&self) -> Option<u64> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.inner.now_ns.load(Ordering::SeqCst))
    }
}

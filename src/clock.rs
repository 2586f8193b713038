//! Clock abstractions used by window rollover and the admission gateway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in whole seconds.
pub type UnixSeconds = u64;

/// Clock abstraction so window timing can be controlled in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_unix(&self) -> UnixSeconds;
}

/// Wall clock backed by `SystemTime::now()`.
///
/// Notes: window starts are stored as absolute timestamps so they stay
/// meaningful across process restarts; a monotonic clock would not.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> UnixSeconds {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn at(now: UnixSeconds) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    /// Jump to an absolute time. Moving backwards is allowed so skew
    /// handling can be exercised.
    pub fn set(&self, now: UnixSeconds) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advance by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> UnixSeconds {
        self.now.load(Ordering::SeqCst)
    }
}

//! Per-caller request throttling for interactive job triggers.

use std::{num::NonZeroU32, time::Duration};

use governor::{
    clock::{Clock as _, DefaultClock},
    DefaultKeyedRateLimiter, Quota,
};

/// Keys above this many tracked callers trigger a sweep of idle entries.
const SWEEP_THRESHOLD: usize = 1024;

pub trait RateLimiter: Send + Sync + 'static {
    /// `Ok` if `key` may proceed now, otherwise how long it has to wait.
    fn check(&self, key: &str) -> Result<(), Duration>;
}

/// Token bucket per key, refilled at a fixed rate.
pub struct KeyedRateLimiter {
    inner: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl KeyedRateLimiter {
    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self {
            inner: governor::RateLimiter::keyed(Quota::per_minute(limit)),
            clock: DefaultClock::default(),
        }
    }
}

impl RateLimiter for KeyedRateLimiter {
    fn check(&self, key: &str) -> Result<(), Duration> {
        if self.inner.len() > SWEEP_THRESHOLD {
            self.inner.retain_recent();
        }

        self.inner
            .check_key(&key.to_owned())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

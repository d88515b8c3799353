//! Request admission shared by every outbound call of a run.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::warn;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Source of time for the rate guard and retry backoff.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 5000,
            per_hour: 10000,
        }
    }
}

struct Windows {
    minute_start: Instant,
    minute_count: u32,
    hour_start: Instant,
    hour_count: u32,
}

impl Windows {
    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.minute_start) >= MINUTE {
            self.minute_start = now;
            self.minute_count = 0;
        }
        if now.duration_since(self.hour_start) >= HOUR {
            self.hour_start = now;
            self.hour_count = 0;
        }
    }
}

/// Counts requests in minute and hour windows and pauses callers once a limit is reached.
///
/// One guard is shared (behind an `Arc`) by all transports of a run; the counters are
/// protected by a mutex so concurrent transfer tasks can admit requests safely.
pub struct RateGuard {
    limits: RateLimits,
    clock: Arc<dyn Clock>,
    windows: Mutex<Windows>,
}

impl RateGuard {
    pub fn new(limits: RateLimits) -> Self {
        Self::with_clock(limits, Arc::new(SystemClock))
    }

    pub fn with_clock(limits: RateLimits, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            limits,
            clock,
            windows: Mutex::new(Windows {
                minute_start: now,
                minute_count: 0,
                hour_start: now,
                hour_count: 0,
            }),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Admits one request, sleeping a minute at a time while either window is full.
    pub fn admit(&self) {
        loop {
            {
                let mut windows = match self.windows.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                windows.roll(self.clock.now());

                if windows.minute_count < self.limits.per_minute
                    && windows.hour_count < self.limits.per_hour
                {
                    windows.minute_count += 1;
                    windows.hour_count += 1;
                    return;
                }

                warn!(
                    minute = windows.minute_count,
                    hour = windows.hour_count,
                    "rate limit reached, pausing for one minute"
                );
            }
            self.clock.sleep(MINUTE);
        }
    }

    /// Requests counted in the current minute and hour windows.
    pub fn counts(&self) -> (u32, u32) {
        let windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (windows.minute_count, windows.hour_count)
    }
}

//! Monotonic deadlines for blocking calls.
//!
//! A [`Timeout`] is created at the start of a blocking operation and then
//! consulted once per wait step. A duration of zero means "no deadline".

use std::time::{Duration, Instant};

/// Current monotonic time.
pub fn now() -> Instant {
    Instant::now()
}

/// Deadline tracking for one blocking operation.
#[derive(Debug, Clone)]
pub struct Timeout {
    ms: u32,
    end: Instant,
    delta: Duration,
    ceiling: Option<Duration>,
    attempted: bool,
    overflow: bool,
}

impl Timeout {
    /// Start a timeout of `ms` milliseconds from now. `0` never expires.
    pub fn start(ms: u32) -> Self {
        let start = now();
        let delta = Duration::from_millis(u64::from(ms));
        Self {
            ms,
            end: start + delta,
            delta,
            ceiling: None,
            attempted: false,
            overflow: false,
        }
    }

    /// Cap every single wait step at `limit_ms`.
    ///
    /// Used where the platform wait call takes a narrower integer than the
    /// caller's timeout. The blocking loop keeps going until the full
    /// timeout has elapsed.
    pub fn with_ceiling(mut self, limit_ms: u32) -> Self {
        let ceiling = Duration::from_millis(u64::from(limit_ms));
        self.ceiling = Some(ceiling);
        self.overflow = self.ms > limit_ms;
        if self.overflow {
            self.delta = ceiling;
        }
        self
    }

    /// Requested duration in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        self.ms
    }

    pub fn is_infinite(&self) -> bool {
        self.ms == 0
    }

    /// Whether the last computed step was clamped to the ceiling.
    ///
    /// A wait step that times out while this is set does not mean the
    /// caller's deadline has passed.
    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    /// Record that a wait attempt was made.
    pub fn record_attempt(&mut self) {
        self.attempted = true;
    }

    /// Recompute the remaining time and report whether the deadline passed.
    ///
    /// Never reports expiry for an infinite timeout or before the first
    /// [`record_attempt`](Self::record_attempt).
    pub fn expired(&mut self) -> bool {
        if !self.attempted || self.is_infinite() {
            return false;
        }

        let now = now();
        self.delta = self.end.saturating_duration_since(now);
        if let Some(ceiling) = self.ceiling {
            self.overflow = self.delta > ceiling;
            if self.overflow {
                self.delta = ceiling;
            }
        }

        now >= self.end
    }

    /// Milliseconds to wait in the next step, rounded up.
    ///
    /// `0` for an infinite timeout; callers map that to their platform's
    /// "wait forever" value.
    pub fn remaining_ms(&self) -> u32 {
        if self.is_infinite() {
            return 0;
        }
        let ms = self.delta.as_nanos().div_ceil(1_000_000);
        u32::try_from(ms).unwrap_or(u32::MAX)
    }
}

//! Timing module - monotonic-clock fixed-timestep accumulator
//!
//! The control thread asks once per wake how many ticks have become due
//! since the last wake. Elapsed time beyond a whole number of periods is
//! carried into the next call, so the average tick rate tracks the
//! configured rate even when the host timer granularity is coarser than
//! one period.

use std::time::{Duration, Instant};

/// Ticks replayed after a long stall are capped; the backlog beyond the
/// cap is discarded rather than replayed as a burst.
pub const MAX_TICKS_PER_WAKE: u32 = 32;

pub struct FixedTimestep {
    last: Instant,
    carry: Duration,
}

impl FixedTimestep {
    pub fn new(now: Instant) -> Self {
        Self {
            last: now,
            carry: Duration::ZERO,
        }
    }

    /// Number of ticks due at `now` for the given period. Consumes whole
    /// periods from the accumulated elapsed time and carries the remainder.
    pub fn due_ticks(&mut self, now: Instant, period: Duration) -> u32 {
        let elapsed = now.saturating_duration_since(self.last) + self.carry;
        self.last = now;

        let period_ns = period.as_nanos().max(1);
        let due = elapsed.as_nanos() / period_ns;

        if due > MAX_TICKS_PER_WAKE as u128 {
            self.carry = Duration::ZERO;
            return MAX_TICKS_PER_WAKE;
        }

        self.carry = elapsed - Duration::from_nanos((due * period_ns) as u64);
        due as u32
    }

    /// Time until the next tick becomes due, given the carried remainder.
    pub fn time_to_next(&self, period: Duration) -> Duration {
        period.saturating_sub(self.carry)
    }
}

//! Injectable time source.
//!
//! Every core component that needs "now" takes a `Arc<dyn Clock>` rather
//! than calling `Timestamp::now()` directly, so tests can drive time
//! deterministically with `SimulatedClock` instead of racing the wall clock.

use std::sync::Mutex;

use chrono::{Duration, Timelike};

use super::value_objects::Timestamp;

/// Approximate NYSE regular session, expressed in UTC and ignoring daylight
/// saving (09:30-16:00 America/New_York is either 13:30-20:00 or
/// 14:30-21:00 UTC depending on the time of year). This crate has no
/// timezone database dependency, so the wider, DST-naive window is used;
/// exact session boundaries belong to a market-calendar component outside
/// this core's scope.
const MARKET_OPEN_UTC_HOUR: u32 = 13;
const MARKET_OPEN_UTC_MINUTE: u32 = 30;
const MARKET_CLOSE_UTC_HOUR: u32 = 21;

/// Injectable source of the current time.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> Timestamp;

    /// Whether `now()` falls inside the approximate regular trading session.
    /// Inclusive of the open boundary, exclusive of the close boundary.
    fn is_market_hours(&self) -> bool {
        let t = self.now().as_datetime();
        let minutes_since_midnight = t.hour() * 60 + t.minute();
        let open = MARKET_OPEN_UTC_HOUR * 60 + MARKET_OPEN_UTC_MINUTE;
        let close = MARKET_CLOSE_UTC_HOUR * 60;
        (open..close).contains(&minutes_since_midnight)
    }
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that never reads the wall clock; time only moves when told to.
/// Used by tests that need deterministic timestamps and by backtest mode.
pub struct SimulatedClock {
    current: Mutex<Timestamp>,
}

impl SimulatedClock {
    /// Start the simulated clock at a fixed point in time.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`. Negative deltas are rejected by
    /// the caller's own logic; this type does not enforce monotonicity
    /// beyond what `advance` is given.
    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = Timestamp::new(current.as_datetime() + delta);
    }

    /// Jump directly to a point in time.
    pub fn set(&self, at: Timestamp) {
        *self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = at;
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn simulated_clock_only_moves_on_advance() {
        let start = Timestamp::new(Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap());
        let clock = SimulatedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), Timestamp::new(Utc.with_ymd_and_hms(2026, 1, 2, 12, 5, 0).unwrap()));
    }

    #[test]
    fn market_hours_window() {
        let open = Timestamp::new(Utc.with_ymd_and_hms(2026, 1, 2, 14, 0, 0).unwrap());
        let midnight = Timestamp::new(Utc.with_ymd_and_hms(2026, 1, 2, 2, 0, 0).unwrap());
        assert!(SimulatedClock::new(open).is_market_hours());
        assert!(!SimulatedClock::new(midnight).is_market_hours());
    }

    #[test]
    fn system_clock_returns_recent_time() {
        let clock = SystemClock;
        let before = Timestamp::now();
        let observed = clock.now();
        assert!(observed.duration_since(before) >= Duration::zero());
    }
}

//! Reject signals outside a configured trading window.
//!
//! Window boundaries are expressed as UTC minutes-since-midnight; this crate
//! carries no timezone database, so callers configure the window already
//! converted to UTC.

use chrono::Timelike;

use super::decision::{ProtectionContext, ProtectionDecision};
use super::stack::Protection;

pub struct TimeWindowProtection {
    start_minute: u32,
    end_minute: u32,
    enabled: bool,
}

impl TimeWindowProtection {
    #[must_use]
    pub fn new(start_minute: u32, end_minute: u32, enabled: bool) -> Self {
        Self {
            start_minute,
            end_minute,
            enabled,
        }
    }
}

impl Protection for TimeWindowProtection {
    fn name(&self) -> &str {
        "time_window"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, ctx: &ProtectionContext) -> ProtectionDecision {
        let t = ctx.now.as_datetime();
        let minute_of_day = t.hour() * 60 + t.minute();
        if (self.start_minute..self.end_minute).contains(&minute_of_day) {
            ProtectionDecision::allow(self.name())
        } else {
            ProtectionDecision::reject(self.name(), "outside the configured trading window")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{Symbol, Timestamp};
    use chrono::{TimeZone, Utc};

    fn ctx_at(hour: u32, minute: u32) -> ProtectionContext {
        ProtectionContext {
            symbol: Symbol::new("AAPL"),
            strategy: "momentum".to_string(),
            now: Timestamp::new(Utc.with_ymd_and_hms(2026, 1, 2, hour, minute, 0).unwrap()),
        }
    }

    #[test]
    fn inclusive_open_exclusive_close() {
        let window = TimeWindowProtection::new(13 * 60 + 30, 21 * 60, true);
        assert!(window.check(&ctx_at(13, 30)).allowed);
        assert!(window.check(&ctx_at(20, 59)).allowed);
        assert!(!window.check(&ctx_at(21, 0)).allowed);
        assert!(!window.check(&ctx_at(13, 29)).allowed);
    }
}

//! Calendar intervals.

use std::fmt;

use chrono::TimeDelta;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// An `INTERVAL` payload: months, days and microseconds kept apart, since a
/// month has no fixed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

impl Interval {
    /// Create an interval from its three components
    pub fn new(months: i32, days: i32, micros: i64) -> Self {
        Self {
            months,
            days,
            micros,
        }
    }

    /// Interval of whole days
    pub fn from_days(days: i32) -> Self {
        Self::new(0, days, 0)
    }

    /// Interval of microseconds only
    pub fn from_micros(micros: i64) -> Self {
        Self::new(0, 0, micros)
    }

    /// Check if the month component is set
    pub fn has_months(&self) -> bool {
        self.months != 0
    }

    /// Fixed-length duration, counting each month as `month_days` days.
    ///
    /// Returns `None` when the result overflows.
    pub fn to_time_delta(&self, month_days: u32) -> Option<TimeDelta> {
        let total_days = i64::from(self.months)
            .checked_mul(i64::from(month_days))?
            .checked_add(i64::from(self.days))?;
        TimeDelta::try_days(total_days)?.checked_add(&TimeDelta::microseconds(self.micros))
    }

    /// Split a fixed duration into whole days and the microsecond remainder.
    ///
    /// Days are floored so the remainder is never negative, the way a host
    /// `timedelta` normalizes. Returns `None` when the day count does not fit.
    pub fn from_time_delta(delta: TimeDelta) -> Option<Self> {
        let total = delta.num_microseconds()?;
        let days = total.div_euclid(MICROS_PER_DAY);
        let micros = total.rem_euclid(MICROS_PER_DAY);
        Some(Self::new(0, i32::try_from(days).ok()?, micros))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.months != 0 {
            parts.push(format!("{} months", self.months));
        }
        if self.days != 0 {
            parts.push(format!("{} days", self.days));
        }
        if self.micros != 0 || parts.is_empty() {
            let sign = if self.micros < 0 { "-" } else { "" };
            let micros = self.micros.unsigned_abs();
            let secs = micros / 1_000_000;
            let frac = micros % 1_000_000;
            let time = format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                secs / 3600,
                (secs / 60) % 60,
                secs % 60
            );
            if frac == 0 {
                parts.push(time);
            } else {
                parts.push(format!("{}.{:06}", time, frac));
            }
        }
        write!(f, "{}", parts.join(" "))
    }
}

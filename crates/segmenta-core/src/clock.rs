//! Time sources.
//!
//! Every store operation reads "now" exactly once from its [`Clock`] and uses
//! that single value for all comparisons and writes in the operation.

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

const LATEST_MICROS: i64 = 253_402_300_799_999_999;

/// The last microsecond of year 9999. Later instants have no fixed-width
/// RFC 3339 form and are never stored.
pub fn latest_instant() -> DateTime<Utc> {
  DateTime::from_timestamp_micros(LATEST_MICROS).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A clock that only moves when told to. Used to exercise TTL expiry.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  pub fn set(&self, at: DateTime<Utc>) { *self.lock() = at; }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.lock();
    *now += by;
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
    // A poisoned clock still holds a valid instant.
    self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.lock() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn manual_clock_advances() {
    let start = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(TimeDelta::hours(1));
    assert_eq!(clock.now(), start + TimeDelta::hours(1));

    clock.set(start);
    assert_eq!(clock.now(), start);
  }

  #[test]
  fn latest_instant_is_end_of_year_9999() {
    let end = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
      + TimeDelta::microseconds(999_999);
    assert_eq!(latest_instant(), end);
  }
}

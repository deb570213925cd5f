//! Memberships: the intervals during which a user belongs to a segment.
//!
//! A membership row is never deleted. It is *closed* by setting `left_at`,
//! either explicitly (removal, segment deletion) or ahead of time when a TTL
//! is given. Whether a row is active is always computed against a single
//! "now"; nothing sweeps expired rows.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, clock::latest_instant, segment::SegmentId};

/// Externally supplied user identity.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// One interval of a user's membership in a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub user_id:    UserId,
  pub segment_id: SegmentId,
  pub added_at:   DateTime<Utc>,
  /// When the membership ended or will end; `None` means open-ended.
  pub left_at:    Option<DateTime<Utc>>,
}

impl Membership {
  pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
    self.left_at.is_none_or(|at| at > now)
  }
}

// ─── Ttl ─────────────────────────────────────────────────────────────────────

/// How long a new membership lasts. Zero hours means indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ttl {
  hours: i64,
}

impl Ttl {
  pub const INDEFINITE: Self = Self { hours: 0 };

  /// One hundred years.
  pub const MAX_HOURS: i64 = 100 * 366 * 24;

  pub fn from_hours(hours: i64) -> Result<Self> {
    if hours < 0 {
      return Err(Error::NegativeTtl(hours));
    }
    if hours > Self::MAX_HOURS {
      return Err(Error::TtlOutOfRange(hours));
    }
    Ok(Self { hours })
  }

  pub fn hours(self) -> i64 { self.hours }

  pub fn is_indefinite(self) -> bool { self.hours == 0 }

  /// The `left_at` for a membership added at `now`. Fails if that instant
  /// would fall after [`latest_instant`].
  pub fn expiry_from(self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    if self.is_indefinite() {
      return Ok(None);
    }
    TimeDelta::try_hours(self.hours)
      .and_then(|delta| now.checked_add_signed(delta))
      .filter(|at| *at <= latest_instant())
      .map(Some)
      .ok_or(Error::TtlOutOfRange(self.hours))
  }
}

/// Distinct ids in first-seen order.
pub fn dedup_ids<T: Copy + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
  let mut seen = std::collections::HashSet::with_capacity(ids.len());
  ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
  }

  #[test]
  fn open_ended_membership_is_active() {
    let m = Membership {
      user_id:    UserId(1),
      segment_id: SegmentId(1),
      added_at:   at(5, 0),
      left_at:    None,
    };
    assert!(m.is_active_at(at(30, 0)));
  }

  #[test]
  fn membership_expires_at_left_at() {
    let m = Membership {
      user_id:    UserId(1),
      segment_id: SegmentId(1),
      added_at:   at(5, 0),
      left_at:    Some(at(5, 1)),
    };
    assert!(m.is_active_at(at(5, 0)));
    assert!(!m.is_active_at(at(5, 1)));
    assert!(!m.is_active_at(at(6, 0)));
  }

  #[test]
  fn ttl_validation() {
    assert!(Ttl::from_hours(0).unwrap().is_indefinite());
    assert_eq!(Ttl::from_hours(2).unwrap().hours(), 2);
    assert!(matches!(Ttl::from_hours(-1), Err(Error::NegativeTtl(-1))));
    assert!(matches!(
      Ttl::from_hours(i64::MAX),
      Err(Error::TtlOutOfRange(_))
    ));
  }

  #[test]
  fn ttl_is_capped_at_a_century() {
    assert!(Ttl::from_hours(Ttl::MAX_HOURS).is_ok());
    assert!(matches!(
      Ttl::from_hours(Ttl::MAX_HOURS + 1),
      Err(Error::TtlOutOfRange(_))
    ));
    // Would expire in year 13431.
    assert!(matches!(
      Ttl::from_hours(100_000_000),
      Err(Error::TtlOutOfRange(100_000_000))
    ));
  }

  #[test]
  fn expiry_never_passes_year_9999() {
    let late = Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap();
    let ttl = Ttl::from_hours(48).unwrap();
    assert!(matches!(ttl.expiry_from(late), Err(Error::TtlOutOfRange(48))));

    let last_hour = latest_instant() - TimeDelta::hours(1);
    assert!(Ttl::from_hours(1).unwrap().expiry_from(last_hour).is_ok());
  }

  #[test]
  fn ttl_expiry() {
    let now = at(5, 0);
    assert_eq!(Ttl::INDEFINITE.expiry_from(now).unwrap(), None);
    assert_eq!(
      Ttl::from_hours(1).unwrap().expiry_from(now).unwrap(),
      Some(at(5, 1))
    );
  }

  #[test]
  fn dedup_keeps_first_occurrence() {
    assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
  }
}

//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision (`2024-01-05T09:30:00.000000Z`), so comparing the strings in SQL
//! compares the instants.

use chrono::{DateTime, SecondsFormat, Utc};
use segmenta_core::{
  history::MembershipRecord,
  membership::{Membership, UserId},
  segment::{Segment, SegmentId},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `segments` row.
pub struct RawSegment {
  pub id:         i64,
  pub name:       String,
  pub deleted_at: Option<String>,
}

impl RawSegment {
  pub fn into_segment(self) -> Result<Segment> {
    Ok(Segment {
      id:         SegmentId(self.id),
      name:       self.name,
      deleted_at: decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

/// Raw values read directly from a `memberships` row.
pub struct RawMembership {
  pub user_id:    i64,
  pub segment_id: i64,
  pub added_at:   String,
  pub left_at:    Option<String>,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      user_id:    UserId(self.user_id),
      segment_id: SegmentId(self.segment_id),
      added_at:   decode_dt(&self.added_at)?,
      left_at:    decode_opt_dt(self.left_at.as_deref())?,
    })
  }
}

/// A `memberships` row joined with its segment's name.
pub struct RawRecord {
  pub user_id:  i64,
  pub segment:  String,
  pub added_at: String,
  pub left_at:  Option<String>,
}

impl RawRecord {
  pub fn into_record(self) -> Result<MembershipRecord> {
    Ok(MembershipRecord {
      user_id:  UserId(self.user_id),
      segment:  self.segment,
      added_at: decode_dt(&self.added_at)?,
      left_at:  decode_opt_dt(self.left_at.as_deref())?,
    })
  }
}

//! Membership history reconstruction and CSV rendering.
//!
//! History is derived from membership rows whose `added_at` falls in the
//! requested month. Each row yields an `add` event and, if it has been closed
//! (or is due to close), a `remove` event at `left_at`. The remove event is
//! kept even when `left_at` lies beyond the month, because selection is by the
//! row's add timestamp.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, membership::UserId};

// ─── Period ──────────────────────────────────────────────────────────────────

/// A calendar month in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
  month: u32,
  year:  i32,
}

impl Period {
  pub fn new(month: u32, year: i32) -> Result<Self> {
    if !(1..=9999).contains(&year) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
      return Err(Error::InvalidPeriod { month, year });
    }
    Ok(Self { month, year })
  }

  pub fn month(self) -> u32 { self.month }

  pub fn year(self) -> i32 { self.year }

  /// Half-open bounds `[start, end)` of the month.
  pub fn bounds(self) -> (DateTime<Utc>, DateTime<Utc>) {
    let (next_year, next_month) = if self.month == 12 {
      (self.year + 1, 1)
    } else {
      (self.year, self.month + 1)
    };
    (month_start(self.year, self.month), month_start(next_year, next_month))
  }

  /// Deterministic upload name; re-generating a period overwrites the
  /// previous upload.
  pub fn report_file_name(self) -> String {
    format!("report_{}_{}.csv", self.month, self.year)
  }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
  NaiveDate::from_ymd_opt(year, month, 1)
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|naive| Utc.from_utc_datetime(&naive))
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  Add,
  Remove,
}

impl Operation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Remove => "remove",
    }
  }
}

/// A membership row joined with its segment name, as read for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
  pub user_id:  UserId,
  pub segment:  String,
  pub added_at: DateTime<Utc>,
  pub left_at:  Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
  pub user_id:   UserId,
  pub segment:   String,
  pub operation: Operation,
  pub date:      DateTime<Utc>,
}

/// Expand rows into add/remove events, ordered by date.
///
/// The sort is stable: events with equal dates keep the order in which their
/// rows were read, and an add precedes the remove from the same row.
pub fn events_from_records(records: Vec<MembershipRecord>) -> Vec<HistoryEvent> {
  let mut events = Vec::with_capacity(records.len() * 2);
  for record in records {
    let left_at = record.left_at;
    let add = HistoryEvent {
      user_id:   record.user_id,
      segment:   record.segment,
      operation: Operation::Add,
      date:      record.added_at,
    };
    let remove = left_at.map(|date| HistoryEvent {
      operation: Operation::Remove,
      date,
      ..add.clone()
    });
    events.push(add);
    events.extend(remove);
  }
  events.sort_by_key(|e| e.date);
  events
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

const CSV_HEADER: [&str; 4] = ["user_id", "segment", "operation", "date"];

/// Render a timestamp for the report: fixed width, so rows sort as text.
pub fn format_report_date(date: DateTime<Utc>) -> String {
  date.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string()
}

/// Render events as a header-first CSV document.
pub fn render_csv(events: &[HistoryEvent]) -> Vec<u8> {
  let mut out = String::with_capacity(32 * (events.len() + 1));
  write_row(&mut out, CSV_HEADER);
  for event in events {
    write_row(&mut out, [
      event.user_id.to_string().as_str(),
      event.segment.as_str(),
      event.operation.as_str(),
      format_report_date(event.date).as_str(),
    ]);
  }
  out.into_bytes()
}

fn write_row<const N: usize>(out: &mut String, fields: [&str; N]) {
  for (i, field) in fields.iter().enumerate() {
    if i > 0 {
      out.push(',');
    }
    if field.contains([',', '"', '\n', '\r']) {
      let _ = write!(out, "\"{}\"", field.replace('"', "\"\""));
    } else {
      out.push_str(field);
    }
  }
  out.push('\n');
}

//! Segments: named cohorts that users can belong to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Surrogate key of a segment row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentId(pub i64);

impl std::fmt::Display for SegmentId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// A segment row. The name is unique across all rows, deleted or not, and
/// never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
  pub id:         SegmentId,
  pub name:       String,
  /// Soft-deletion timestamp; `None` while the segment is live.
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Segment {
  pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
    self.deleted_at.is_none_or(|at| at > now)
  }
}

/// Validate a segment name supplied by a caller.
pub fn validate_name(name: &str) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::EmptySegmentName);
  }
  Ok(())
}

// ─── Percent ─────────────────────────────────────────────────────────────────

/// The share of known users to sample into a new segment, in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(f64);

impl Percent {
  pub fn new(value: f64) -> Result<Self> {
    if !(0.0..=1.0).contains(&value) {
      return Err(Error::InvalidPercent(value));
    }
    Ok(Self(value))
  }

  pub fn get(self) -> f64 { self.0 }

  /// Whether creating a segment with this percentage samples any users.
  pub fn samples(self) -> bool { self.0 > 0.0 }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`crate::store::SegmentStore::delete_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
  /// False when the segment was unknown or already deleted.
  pub deleted:            bool,
  pub memberships_closed: usize,
}

/// Result of [`crate::service::Segmentation::create_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
  Created { id: SegmentId, sampled: usize },
  /// A segment with this name already exists, possibly soft-deleted.
  AlreadyExists,
}

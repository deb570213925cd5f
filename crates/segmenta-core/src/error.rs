//! Error types for `segmenta-core`.

use thiserror::Error;

use crate::membership::UserId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("percentage must be set in the range 0.0-1.0, got {0}")]
  InvalidPercent(f64),

  #[error("ttl must not be negative, got {0}")]
  NegativeTtl(i64),

  #[error("ttl of {0} hours is out of range")]
  TtlOutOfRange(i64),

  #[error("invalid report period: month {month}, year {year}")]
  InvalidPeriod { month: u32, year: i32 },

  #[error("segment name must not be empty")]
  EmptySegmentName,

  #[error("at least one segment must be specified")]
  EmptySegmentList,

  // ── Domain ──────────────────────────────────────────────────────────────
  #[error(
    "the specified segments do not exist or have already been deleted: {}",
    .0.join(", ")
  )]
  SegmentsNotFound(Vec<String>),

  #[error("user {0} does not exist")]
  UserNotFound(UserId),

  #[error("report delivery is unavailable, please try again later")]
  DeliveryUnavailable,

  // ── Infrastructure ──────────────────────────────────────────────────────
  #[error("{operation} failed")]
  Store {
    operation: &'static str,
    #[source]
    source:    BoxError,
  },

  #[error("{operation} failed")]
  Delivery {
    operation: &'static str,
    #[source]
    source:    BoxError,
  },
}

impl Error {
  /// Wrap a storage backend failure with the name of the failing operation.
  pub fn store<E>(operation: &'static str) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    move |e| Self::Store { operation, source: Box::new(e) }
  }

  /// Wrap a report delivery failure with the name of the failing operation.
  pub fn delivery<E>(operation: &'static str) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    move |e| Self::Delivery { operation, source: Box::new(e) }
  }

  /// True for errors caused by malformed caller input.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::InvalidPercent(_)
        | Self::NegativeTtl(_)
        | Self::TtlOutOfRange(_)
        | Self::InvalidPeriod { .. }
        | Self::EmptySegmentName
        | Self::EmptySegmentList
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! The `SegmentStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `segmenta-store-sqlite`).
//! [`crate::service::Segmentation`] and the HTTP layer depend on this
//! abstraction, not on any concrete backend.
//!
//! Every method reads the backend's clock once and evaluates "active" as
//! `deleted_at`/`left_at` being absent or later than that instant.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  history::MembershipRecord,
  membership::{Membership, Ttl, UserId},
  segment::{DeleteOutcome, Percent, Segment, SegmentId},
};

/// Abstraction over a segment-membership store.
///
/// Segment and membership rows are never physically deleted. All methods
/// return `Send` futures so the trait can be used behind `axum`.
pub trait SegmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Segment registry ──────────────────────────────────────────────────

  /// Insert a segment. Returns `None` without touching anything if a segment
  /// with this name already exists, soft-deleted or not.
  fn create_segment(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<SegmentId>, Self::Error>> + Send + '_;

  /// Soft-delete the named segment and close its active memberships in a
  /// single transaction. Unknown or already-deleted segments are a no-op.
  fn delete_segment(
    &self,
    name: String,
  ) -> impl Future<Output = Result<DeleteOutcome, Self::Error>> + Send + '_;

  /// Whether an active segment with this name exists.
  fn segment_exists(
    &self,
    name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Sampling ──────────────────────────────────────────────────────────

  /// Add each known user to `segment_id` with probability `percent`, one
  /// independent draw per user, in a single bulk insert. Returns the number
  /// of memberships created.
  ///
  /// Does not check for existing memberships; intended for freshly created
  /// segments only.
  fn assign_random_users(
    &self,
    segment_id: SegmentId,
    percent: Percent,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Memberships ───────────────────────────────────────────────────────

  /// Ensure the user exists and open a membership in each segment the user
  /// is not already actively in. Atomic. Returns the number of memberships
  /// created.
  fn add_segments(
    &self,
    user_id: UserId,
    segment_ids: Vec<SegmentId>,
    ttl: Ttl,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Close the user's active memberships in `segment_ids`. Segments the user
  /// is not actively in are ignored. Returns the number of memberships closed.
  fn remove_segments(
    &self,
    user_id: UserId,
    segment_ids: Vec<SegmentId>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Names of active segments the user is actively a member of, sorted.
  fn active_segments(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Resolve names to active segments. Unknown and deleted names are omitted.
  fn segments_for_names(
    &self,
    names: Vec<String>,
  ) -> impl Future<Output = Result<Vec<Segment>, Self::Error>> + Send + '_;

  fn user_exists(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every membership row of the user, oldest first.
  fn user_memberships(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Vec<Membership>, Self::Error>> + Send + '_;

  // ── Reporting ─────────────────────────────────────────────────────────

  /// Membership rows with `from <= added_at < until`, in insertion order.
  fn memberships_added_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<MembershipRecord>, Self::Error>> + Send + '_;
}

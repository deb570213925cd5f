//! [`Segmentation`]: the operations exposed to callers.
//!
//! Composes a [`SegmentStore`] with a [`ReportDelivery`]: resolves segment
//! names before any mutation (all-or-nothing), chains creation with sampling,
//! and turns membership rows into history reports. Backend failures are
//! wrapped with the name of the failing operation.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
  Error, Result,
  delivery::ReportDelivery,
  history::{self, HistoryEvent, Period},
  membership::{Membership, Ttl, UserId},
  segment::{self, CreateOutcome, DeleteOutcome, Percent, SegmentId},
  store::SegmentStore,
};

pub struct Segmentation<S, D> {
  store:    S,
  delivery: D,
}

impl<S, D> Segmentation<S, D>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  pub fn new(store: S, delivery: D) -> Self { Self { store, delivery } }

  pub fn delivery(&self) -> &D { &self.delivery }

  // ── Segments ──────────────────────────────────────────────────────────────

  /// Register a segment and, if it is new and `percent` is positive, sample
  /// that share of known users into it.
  ///
  /// An existing name (even a soft-deleted one) is left untouched and no
  /// sampling happens.
  pub async fn create_segment(&self, name: &str, percent: Percent) -> Result<CreateOutcome> {
    segment::validate_name(name)?;

    let Some(id) = self
      .store
      .create_segment(name.to_owned())
      .await
      .map_err(Error::store("create_segment"))?
    else {
      debug!(segment = name, "segment already exists; nothing created");
      return Ok(CreateOutcome::AlreadyExists);
    };

    let sampled = if percent.samples() {
      self
        .store
        .assign_random_users(id, percent)
        .await
        .map_err(Error::store("assign_random_users"))?
    } else {
      0
    };

    info!(segment = name, %id, percent = percent.get(), sampled, "segment created");
    Ok(CreateOutcome::Created { id, sampled })
  }

  /// Soft-delete a segment, closing its active memberships. Deleting an
  /// unknown or already-deleted segment succeeds without effect.
  pub async fn delete_segment(&self, name: &str) -> Result<DeleteOutcome> {
    segment::validate_name(name)?;

    let outcome = self
      .store
      .delete_segment(name.to_owned())
      .await
      .map_err(Error::store("delete_segment"))?;

    if outcome.deleted {
      info!(
        segment = name,
        closed = outcome.memberships_closed,
        "segment deleted"
      );
    } else {
      debug!(segment = name, "segment absent or already deleted");
    }
    Ok(outcome)
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  /// Add a user to every named segment. Fails with
  /// [`Error::SegmentsNotFound`] before writing anything if any name is
  /// unknown or deleted.
  pub async fn add_user_segments(
    &self,
    user_id: UserId,
    names: &[String],
    ttl: Ttl,
  ) -> Result<usize> {
    let ids = self.resolve_segments(names).await?;

    let added = self
      .store
      .add_segments(user_id, ids, ttl)
      .await
      .map_err(Error::store("add_segments"))?;

    info!(user = %user_id, added, ttl_hours = ttl.hours(), "memberships added");
    Ok(added)
  }

  /// Remove a user from every named segment. Segments the user is not in are
  /// ignored, but every name must refer to an active segment.
  pub async fn remove_user_segments(&self, user_id: UserId, names: &[String]) -> Result<usize> {
    self.require_user(user_id).await?;
    let ids = self.resolve_segments(names).await?;

    let removed = self
      .store
      .remove_segments(user_id, ids)
      .await
      .map_err(Error::store("remove_segments"))?;

    info!(user = %user_id, removed, "memberships removed");
    Ok(removed)
  }

  pub async fn active_segments(&self, user_id: UserId) -> Result<Vec<String>> {
    self.require_user(user_id).await?;
    self
      .store
      .active_segments(user_id)
      .await
      .map_err(Error::store("active_segments"))
  }

  pub async fn user_memberships(&self, user_id: UserId) -> Result<Vec<Membership>> {
    self.require_user(user_id).await?;
    self
      .store
      .user_memberships(user_id)
      .await
      .map_err(Error::store("user_memberships"))
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  /// Add and remove events for memberships added during `period`, by date.
  pub async fn user_history(&self, period: Period) -> Result<Vec<HistoryEvent>> {
    let (from, until) = period.bounds();
    let records = self
      .store
      .memberships_added_between(from, until)
      .await
      .map_err(Error::store("memberships_added_between"))?;
    Ok(history::events_from_records(records))
  }

  /// The history for `period` as CSV.
  pub async fn report_file(&self, period: Period) -> Result<Vec<u8>> {
    let events = self.user_history(period).await?;
    Ok(history::render_csv(&events))
  }

  /// Upload the CSV report for `period` and return its URL.
  ///
  /// Returns [`Error::DeliveryUnavailable`] without reading the store when the
  /// delivery collaborator is down.
  pub async fn report_link(&self, period: Period) -> Result<String> {
    if !self.delivery.is_available() {
      return Err(Error::DeliveryUnavailable);
    }

    let file = self.report_file(period).await?;
    let name = period.report_file_name();
    let url = self
      .delivery
      .upload(name.clone(), file)
      .await
      .map_err(Error::delivery("upload"))?;

    info!(file = %name, %url, "report uploaded");
    Ok(url)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn require_user(&self, user_id: UserId) -> Result<()> {
    let exists = self
      .store
      .user_exists(user_id)
      .await
      .map_err(Error::store("user_exists"))?;
    if !exists {
      return Err(Error::UserNotFound(user_id));
    }
    Ok(())
  }

  /// Map names to active segment ids, failing if any name does not resolve.
  async fn resolve_segments(&self, names: &[String]) -> Result<Vec<SegmentId>> {
    if names.is_empty() {
      return Err(Error::EmptySegmentList);
    }
    for name in names {
      segment::validate_name(name)?;
    }

    let segments = self
      .store
      .segments_for_names(names.to_vec())
      .await
      .map_err(Error::store("segments_for_names"))?;

    let found: HashSet<&str> = segments.iter().map(|s| s.name.as_str()).collect();
    let mut reported = HashSet::new();
    let missing: Vec<String> = names
      .iter()
      .filter(|n| !found.contains(n.as_str()) && reported.insert(n.as_str()))
      .cloned()
      .collect();
    if !missing.is_empty() {
      return Err(Error::SegmentsNotFound(missing));
    }

    Ok(segments.into_iter().map(|s| s.id).collect())
  }
}

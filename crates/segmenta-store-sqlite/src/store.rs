//! [`SqliteStore`]: the SQLite implementation of [`SegmentStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use segmenta_core::{
  clock::{Clock, SystemClock, latest_instant},
  history::MembershipRecord,
  membership::{Membership, Ttl, UserId, dedup_ids},
  segment::{DeleteOutcome, Percent, Segment, SegmentId},
  store::SegmentStore,
};

use crate::{
  Result,
  encode::{RawMembership, RawRecord, RawSegment, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A segmentation store backed by a single SQLite file.
///
/// Clones share the inner connection and clock.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    tracing::debug!(path = %path.as_ref().display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, as used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the time source used to decide what is active.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The single "now" of one operation, in column encoding.
  fn now(&self) -> String { encode_dt(self.clock.now()) }

  /// Run raw SQL against the store, e.g. to install failure triggers.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SegmentStore impl ───────────────────────────────────────────────────────

impl SegmentStore for SqliteStore {
  type Error = crate::Error;

  // ── Segment registry ──────────────────────────────────────────────────────

  async fn create_segment(&self, name: String) -> Result<Option<SegmentId>> {
    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "INSERT INTO segments (name) VALUES (?1)
             ON CONFLICT (name) DO NOTHING
             RETURNING id",
            rusqlite::params![name],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(id.map(SegmentId))
  }

  async fn delete_segment(&self, name: String) -> Result<DeleteOutcome> {
    let now = self.now();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id: Option<i64> = tx
          .query_row(
            "UPDATE segments SET deleted_at = ?1
             WHERE name = ?2
               AND (deleted_at IS NULL OR deleted_at > ?1)
             RETURNING id",
            rusqlite::params![now, name],
            |row| row.get(0),
          )
          .optional()?;

        let Some(id) = id else {
          return Ok(DeleteOutcome::default());
        };

        let closed = tx.execute(
          "UPDATE memberships SET left_at = ?1
           WHERE segment_id = ?2
             AND (left_at IS NULL OR left_at > ?1)",
          rusqlite::params![now, id],
        )?;

        tx.commit()?;
        Ok(DeleteOutcome { deleted: true, memberships_closed: closed })
      })
      .await?;

    Ok(outcome)
  }

  async fn segment_exists(&self, name: String) -> Result<bool> {
    let now = self.now();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM segments
             WHERE name = ?1
               AND (deleted_at IS NULL OR deleted_at > ?2)
           )",
          rusqlite::params![name, now],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(exists)
  }

  // ── Sampling ──────────────────────────────────────────────────────────────

  async fn assign_random_users(&self, segment_id: SegmentId, percent: Percent) -> Result<usize> {
    let now = self.now();
    let percent = percent.get();

    // random() is uniform over the i64 range; scaled into [0, 1) it is drawn
    // once per candidate row.
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO memberships (user_id, segment_id, added_at, left_at)
           SELECT id, ?1, ?2, NULL FROM users
           WHERE ?3 >= 1.0
              OR (random() / 18446744073709551616.0) + 0.5 < ?3
           ORDER BY id",
          rusqlite::params![segment_id.0, now, percent],
        )?)
      })
      .await?;

    Ok(inserted)
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  async fn add_segments(
    &self,
    user_id: UserId,
    segment_ids: Vec<SegmentId>,
    ttl: Ttl,
  ) -> Result<usize> {
    let now_dt = self.clock.now();
    let left_at = ttl.expiry_from(now_dt)?.map(encode_dt);
    let now = encode_dt(now_dt);
    let user = user_id.0;
    let ids: Vec<i64> = dedup_ids(&segment_ids).into_iter().map(|id| id.0).collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
          "INSERT INTO users (id) VALUES (?1) ON CONFLICT DO NOTHING",
          rusqlite::params![user],
        )?;

        let mut inserted = 0;
        {
          let mut is_active = tx.prepare(
            "SELECT EXISTS (
               SELECT 1 FROM memberships
               WHERE user_id = ?1 AND segment_id = ?2
                 AND (left_at IS NULL OR left_at > ?3)
             )",
          )?;
          // Selecting through `segments` skips a segment deleted since the
          // caller resolved it.
          let mut insert = tx.prepare(
            "INSERT INTO memberships (user_id, segment_id, added_at, left_at)
             SELECT ?1, id, ?3, ?4 FROM segments
             WHERE id = ?2
               AND (deleted_at IS NULL OR deleted_at > ?3)",
          )?;

          for segment_id in ids {
            let active: bool = is_active
              .query_row(rusqlite::params![user, segment_id, now], |row| row.get(0))?;
            if !active {
              inserted += insert.execute(rusqlite::params![user, segment_id, now, left_at])?;
            }
          }
        }

        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }

  async fn remove_segments(&self, user_id: UserId, segment_ids: Vec<SegmentId>) -> Result<usize> {
    let now = self.now();
    let user = user_id.0;
    let ids: Vec<i64> = dedup_ids(&segment_ids).into_iter().map(|id| id.0).collect();

    let closed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut closed = 0;
        {
          let mut close = tx.prepare(
            "UPDATE memberships SET left_at = ?1
             WHERE user_id = ?2 AND segment_id = ?3
               AND (left_at IS NULL OR left_at > ?1)",
          )?;
          for segment_id in ids {
            closed += close.execute(rusqlite::params![now, user, segment_id])?;
          }
        }

        tx.commit()?;
        Ok(closed)
      })
      .await?;

    Ok(closed)
  }

  async fn active_segments(&self, user_id: UserId) -> Result<Vec<String>> {
    let now = self.now();

    let names = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT s.name
           FROM memberships m
           JOIN segments s ON s.id = m.segment_id
           WHERE m.user_id = ?1
             AND (m.left_at IS NULL OR m.left_at > ?2)
             AND (s.deleted_at IS NULL OR s.deleted_at > ?2)
           ORDER BY s.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id.0, now], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(names)
  }

  async fn segments_for_names(&self, names: Vec<String>) -> Result<Vec<Segment>> {
    let now = self.now();

    let raws: Vec<RawSegment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, deleted_at FROM segments
           WHERE name = ?1
             AND (deleted_at IS NULL OR deleted_at > ?2)",
        )?;

        let mut raws = Vec::with_capacity(names.len());
        for name in dedup_names(names) {
          let raw = stmt
            .query_row(rusqlite::params![name, now], |row| {
              Ok(RawSegment {
                id:         row.get(0)?,
                name:       row.get(1)?,
                deleted_at: row.get(2)?,
              })
            })
            .optional()?;
          raws.extend(raw);
        }
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawSegment::into_segment).collect()
  }

  async fn user_exists(&self, user_id: UserId) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
          rusqlite::params![user_id.0],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(exists)
  }

  async fn user_memberships(&self, user_id: UserId) -> Result<Vec<Membership>> {
    let raws: Vec<RawMembership> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, segment_id, added_at, left_at
           FROM memberships
           WHERE user_id = ?1
           ORDER BY membership_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id.0], |row| {
            Ok(RawMembership {
              user_id:    row.get(0)?,
              segment_id: row.get(1)?,
              added_at:   row.get(2)?,
              left_at:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMembership::into_membership).collect()
  }

  // ── Reporting ─────────────────────────────────────────────────────────────

  async fn memberships_added_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<MembershipRecord>> {
    let from_str = encode_dt(from);
    // Nothing can be stored past `latest_instant`, so a later bound is open.
    let until_str = (until <= latest_instant()).then(|| encode_dt(until));

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.user_id, s.name, m.added_at, m.left_at
           FROM memberships m
           JOIN segments s ON s.id = m.segment_id
           WHERE m.added_at >= ?1
             AND (?2 IS NULL OR m.added_at < ?2)
           ORDER BY m.membership_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, until_str], |row| {
            Ok(RawRecord {
              user_id:  row.get(0)?,
              segment:  row.get(1)?,
              added_at: row.get(2)?,
              left_at:  row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

/// Distinct names in first-seen order.
fn dedup_names(names: Vec<String>) -> Vec<String> {
  let mut seen = std::collections::HashSet::with_capacity(names.len());
  names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

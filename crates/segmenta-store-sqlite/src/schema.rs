//! SQL schema for the Segmenta SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Segments are soft-deleted and never removed; names are never reused.
CREATE TABLE IF NOT EXISTS segments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    deleted_at  TEXT                 -- RFC 3339 UTC, micros; NULL while live
);

CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY  -- externally supplied
);

-- One row per membership interval; rows are closed, never deleted.
-- At most one row per (user_id, segment_id) may be active at a time,
-- where active means left_at IS NULL OR left_at > now.
CREATE TABLE IF NOT EXISTS memberships (
    membership_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES users(id),
    segment_id    INTEGER NOT NULL REFERENCES segments(id),
    added_at      TEXT NOT NULL,
    left_at       TEXT
);

CREATE INDEX IF NOT EXISTS memberships_user_idx    ON memberships(user_id, segment_id);
CREATE INDEX IF NOT EXISTS memberships_segment_idx ON memberships(segment_id);
CREATE INDEX IF NOT EXISTS memberships_added_idx   ON memberships(added_at);

PRAGMA user_version = 1;
";

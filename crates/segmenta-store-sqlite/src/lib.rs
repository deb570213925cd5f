//! SQLite backend for the Segmenta segmentation store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. A closure handed to that thread runs to
//! completion even if the awaiting request is dropped, so every transaction
//! either commits whole or rolls back.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

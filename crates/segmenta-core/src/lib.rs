//! Core types and trait definitions for the Segmenta segmentation service.
//!
//! This crate has no HTTP or database dependencies. Storage backends
//! implement [`store::SegmentStore`], report hosts implement
//! [`delivery::ReportDelivery`], and [`service::Segmentation`] composes the two
//! into the operations exposed by the API.

pub mod clock;
pub mod delivery;
pub mod error;
pub mod history;
pub mod membership;
pub mod segment;
pub mod service;
pub mod store;

pub use error::{Error, Result};

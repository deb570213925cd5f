//! Handlers for `/segment` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/segment/create` | Body: `{"segment":"NAME","percent":0.1}`; 201, or 200 if the name exists |
//! | `DELETE` | `/segment/delete` | Body: `{"segment":"NAME"}`; missing segments are a no-op |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use segmenta_core::{
  delivery::ReportDelivery,
  segment::{CreateOutcome, Percent},
  service::Segmentation,
  store::SegmentStore,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, JsonBody};

/// Response body for mutating endpoints.
#[derive(Debug, Serialize)]
pub struct Message {
  pub message: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sampled: Option<usize>,
}

impl Message {
  pub fn new(message: &'static str) -> Self { Self { message, sampled: None } }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub segment: String,
  /// Share of known users to sample into the new segment. Default `0`.
  #[serde(default)]
  pub percent: f64,
}

/// `POST /segment/create`
pub async fn create<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<(StatusCode, Json<Message>), ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  let percent = Percent::new(body.percent)?;

  let response = match service.create_segment(&body.segment, percent).await? {
    CreateOutcome::Created { sampled, .. } => (
      StatusCode::CREATED,
      Json(Message { message: "created", sampled: Some(sampled) }),
    ),
    CreateOutcome::AlreadyExists => (StatusCode::OK, Json(Message::new("already exists"))),
  };
  Ok(response)
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
  pub segment: String,
}

/// `DELETE /segment/delete`
pub async fn delete<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  JsonBody(body): JsonBody<DeleteBody>,
) -> Result<Json<Message>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  service.delete_segment(&body.segment).await?;
  Ok(Json(Message::new("deleted")))
}

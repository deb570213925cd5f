//! Handlers for `/user` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/user/add` | Body: `{"user_id":1000,"segments":["A"],"ttl":24}`; `ttl` in hours, 0 = none |
//! | `DELETE` | `/user/remove` | Body: `{"user_id":1000,"segments":["A"]}` |
//! | `GET`    | `/user/get` | `?user_id` required; active segment names |
//! | `GET`    | `/user/memberships` | `?user_id` required; every membership row |

use std::sync::Arc;

use axum::{Json, extract::State};
use segmenta_core::{
  delivery::ReportDelivery,
  membership::{Membership, Ttl, UserId},
  service::Segmentation,
  store::SegmentStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  error::{ApiError, JsonBody, QueryParams},
  segments::Message,
};

// ─── Add ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub user_id:  UserId,
  pub segments: Vec<String>,
  #[serde(default)]
  pub ttl:      i64,
}

/// `POST /user/add`
pub async fn add<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  JsonBody(body): JsonBody<AddBody>,
) -> Result<Json<Message>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  let ttl = Ttl::from_hours(body.ttl)?;
  service
    .add_user_segments(body.user_id, &body.segments, ttl)
    .await?;
  Ok(Json(Message::new("added")))
}

// ─── Remove ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RemoveBody {
  pub user_id:  UserId,
  pub segments: Vec<String>,
}

/// `DELETE /user/remove`
pub async fn remove<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  JsonBody(body): JsonBody<RemoveBody>,
) -> Result<Json<Message>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  service
    .remove_user_segments(body.user_id, &body.segments)
    .await?;
  Ok(Json(Message::new("removed")))
}

// ─── Queries ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserParams {
  pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct ActiveSegments {
  pub segment: Vec<String>,
}

/// `GET /user/get?user_id=<id>`
pub async fn get_active<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  QueryParams(params): QueryParams<UserParams>,
) -> Result<Json<ActiveSegments>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  let segment = service.active_segments(params.user_id).await?;
  Ok(Json(ActiveSegments { segment }))
}

/// `GET /user/memberships?user_id=<id>`
pub async fn memberships<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  QueryParams(params): QueryParams<UserParams>,
) -> Result<Json<Vec<Membership>>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  Ok(Json(service.user_memberships(params.user_id).await?))
}

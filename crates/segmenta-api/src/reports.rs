//! Handlers for `/report` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/report/` | `?month&year` required; history events as JSON |
//! | `GET`  | `/report/file` | Same history as a CSV download with an `ETag` |
//! | `GET`  | `/report/link` | Uploads the CSV; 503 if delivery is unavailable |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use segmenta_core::{
  delivery::ReportDelivery,
  history::{HistoryEvent, Period},
  service::Segmentation,
  store::SegmentStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  error::{ApiError, QueryParams},
  etag,
};

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
  pub month: u32,
  pub year:  i32,
}

impl PeriodParams {
  fn period(&self) -> Result<Period, ApiError> { Ok(Period::new(self.month, self.year)?) }
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /report/?month=<m>&year=<y>`
pub async fn history<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  QueryParams(params): QueryParams<PeriodParams>,
) -> Result<Json<Vec<HistoryEvent>>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  Ok(Json(service.user_history(params.period()?).await?))
}

// ─── File ─────────────────────────────────────────────────────────────────────

/// `GET /report/file?month=<m>&year=<y>`
///
/// Answers `304 Not Modified` when `If-None-Match` carries the current ETag.
pub async fn file<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  QueryParams(params): QueryParams<PeriodParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  let period = params.period()?;
  let content = service.report_file(period).await?;
  let etag = etag::compute_etag(&content);

  let not_modified = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| etag::matches(v, &etag));
  if not_modified {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  let disposition = format!("attachment; filename=\"{}\"", period.report_file_name());
  let headers = [
    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
    (header::ETAG, etag),
    (header::CONTENT_DISPOSITION, disposition),
  ];
  Ok((headers, content).into_response())
}

// ─── Link ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Link {
  pub link: String,
}

/// `GET /report/link?month=<m>&year=<y>`
pub async fn link<S, D>(
  State(service): State<Arc<Segmentation<S, D>>>,
  QueryParams(params): QueryParams<PeriodParams>,
) -> Result<Json<Link>, ApiError>
where
  S: SegmentStore,
  D: ReportDelivery,
{
  let link = service.report_link(params.period()?).await?;
  Ok(Json(Link { link }))
}

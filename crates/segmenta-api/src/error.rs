//! API error type, request extractors with JSON rejections, and the
//! [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
};
use segmenta_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("unavailable: {0}")]
  Unavailable(String),

  /// Never shown to clients; logged in full instead.
  #[error("internal error: {0}")]
  Internal(#[source] CoreError),
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      e if e.is_validation() => Self::BadRequest(e.to_string()),
      e @ CoreError::SegmentsNotFound(_) => Self::BadRequest(e.to_string()),
      e @ CoreError::UserNotFound(_) => Self::NotFound(e.to_string()),
      e @ CoreError::DeliveryUnavailable => Self::Unavailable(e.to_string()),
      e => Self::Internal(e),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %error_chain(e), "request failed");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "internal system error".to_string(),
        )
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

/// `outer: inner: root` for an error and all of its sources.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
  let mut out = e.to_string();
  let mut source = e.source();
  while let Some(inner) = source {
    out.push_str(": ");
    out.push_str(&inner.to_string());
    source = inner.source();
  }
  out
}

// ─── Extractors ───────────────────────────────────────────────────────────────

/// [`axum::Json`] whose rejections render as [`ApiError::BadRequest`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// [`axum::extract::Query`] whose rejections render as
/// [`ApiError::BadRequest`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

#[cfg(test)]
mod tests {
  use segmenta_core::membership::UserId;

  use super::*;

  #[test]
  fn core_errors_map_to_statuses() {
    let status = |e: CoreError| ApiError::from(e).into_response().status();

    assert_eq!(status(CoreError::InvalidPercent(2.0)), StatusCode::BAD_REQUEST);
    assert_eq!(status(CoreError::EmptySegmentList), StatusCode::BAD_REQUEST);
    assert_eq!(
      status(CoreError::SegmentsNotFound(vec!["A".into()])),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(status(CoreError::UserNotFound(UserId(1))), StatusCode::NOT_FOUND);
    assert_eq!(
      status(CoreError::DeliveryUnavailable),
      StatusCode::SERVICE_UNAVAILABLE
    );
  }

  #[test]
  fn store_failures_are_opaque() {
    let io = std::io::Error::other("disk on fire");
    let err = CoreError::store("add_segments")(io);
    assert_eq!(error_chain(&err), "add_segments failed: disk on fire");

    let api = ApiError::from(err);
    assert!(matches!(api, ApiError::Internal(_)));
    assert_eq!(
      api.into_response().status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}

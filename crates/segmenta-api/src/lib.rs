//! JSON REST API for Segmenta.
//!
//! Exposes an axum [`Router`] backed by a [`Segmentation`] service over any
//! [`SegmentStore`] and [`ReportDelivery`]. Transport, timeouts and request
//! tracing are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", segmenta_api::api_router(service.clone()))
//! ```

pub mod error;
pub mod etag;
pub mod reports;
pub mod segments;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use segmenta_core::{delivery::ReportDelivery, service::Segmentation, store::SegmentStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, D>(service: Arc<Segmentation<S, D>>) -> Router<()>
where
  S: SegmentStore + 'static,
  D: ReportDelivery + 'static,
{
  Router::new()
    // Segments
    .route("/segment/create", post(segments::create::<S, D>))
    .route("/segment/delete", delete(segments::delete::<S, D>))
    // Users
    .route("/user/add", post(users::add::<S, D>))
    .route("/user/remove", delete(users::remove::<S, D>))
    .route("/user/get", get(users::get_active::<S, D>))
    .route("/user/memberships", get(users::memberships::<S, D>))
    // Reports
    .route("/report", get(reports::history::<S, D>))
    .route("/report/", get(reports::history::<S, D>))
    .route("/report/file", get(reports::file::<S, D>))
    .route("/report/link", get(reports::link::<S, D>))
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::convert::Infallible;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{TimeZone, Utc};
  use segmenta_core::{clock::ManualClock, delivery::NoDelivery};
  use segmenta_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt;

  use super::*;

  /// Pretends to upload and links to a fixed host.
  struct LinkOnly;

  impl ReportDelivery for LinkOnly {
    type Error = Infallible;

    fn is_available(&self) -> bool { true }

    async fn upload(&self, name: String, _content: Vec<u8>) -> Result<String, Infallible> {
      Ok(format!("https://files.example.com/{name}"))
    }
  }

  async fn app_with<D: ReportDelivery + 'static>(delivery: D) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(Segmentation::new(store, delivery)))
  }

  async fn app() -> Router { app_with(NoDelivery).await }

  async fn app_at(clock: Arc<ManualClock>) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap().with_clock(clock);
    api_router(Arc::new(Segmentation::new(store, NoDelivery)))
  }

  async fn send_raw(
    app:     &Router,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    Option<&str>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = match body {
      Some(b) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(b.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
  }

  async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = body.map(|b| b.to_string());
    let resp = send_raw(app, method, uri, vec![], body.as_deref()).await;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }

  async fn create(app: &Router, name: &str) {
    let (status, _) = send(app, "POST", "/segment/create", Some(json!({ "segment": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
  }

  // ── Segments ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_reports_sampling_and_existing_names() {
    let app = app().await;

    let (status, body) = send(
      &app,
      "POST",
      "/segment/create",
      Some(json!({ "segment": "AVITO_VOICE_MESSAGES", "percent": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "message": "created", "sampled": 0 }));

    let (status, body) = send(
      &app,
      "POST",
      "/segment/create",
      Some(json!({ "segment": "AVITO_VOICE_MESSAGES" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "already exists" }));
  }

  #[tokio::test]
  async fn invalid_percent_is_rejected() {
    let app = app().await;
    let (status, body) = send(
      &app,
      "POST",
      "/segment/create",
      Some(json!({ "segment": "A", "percent": 1.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("0.0-1.0"), "{body}");

    // Nothing was created.
    create(&app, "A").await;
  }

  #[tokio::test]
  async fn malformed_json_is_a_bad_request() {
    let app = app().await;

    let resp = send_raw(&app, "POST", "/segment/create", vec![], Some("{not json")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/user/add", Some(json!({ "segments": ["A"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn delete_closes_memberships() {
    let app = app().await;
    create(&app, "A").await;
    send(&app, "POST", "/user/add", Some(json!({ "user_id": 1, "segments": ["A"] }))).await;

    let (status, body) = send(&app, "DELETE", "/segment/delete", Some(json!({ "segment": "A" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "deleted" }));

    let (_, body) = send(&app, "GET", "/user/get?user_id=1", None).await;
    assert_eq!(body, json!({ "segment": [] }));

    // Deleting again is a no-op.
    let (status, _) = send(&app, "DELETE", "/segment/delete", Some(json!({ "segment": "A" }))).await;
    assert_eq!(status, StatusCode::OK);
  }

  // ── Users ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn add_remove_and_get() {
    let app = app().await;
    for name in ["A", "B", "C"] {
      create(&app, name).await;
    }

    let (status, body) = send(
      &app,
      "POST",
      "/user/add",
      Some(json!({ "user_id": 1000, "segments": ["C", "A", "B"], "ttl": 24 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "added" }));

    let (status, body) = send(
      &app,
      "DELETE",
      "/user/remove",
      Some(json!({ "user_id": 1000, "segments": ["B"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "removed" }));

    let (status, body) = send(&app, "GET", "/user/get?user_id=1000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "segment": ["A", "C"] }));

    let (status, body) = send(&app, "GET", "/user/memberships?user_id=1000", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|m| m["user_id"] == 1000 && m["left_at"].is_string()));
  }

  #[tokio::test]
  async fn unknown_segments_are_named() {
    let app = app().await;
    create(&app, "A").await;

    let (status, body) = send(
      &app,
      "POST",
      "/user/add",
      Some(json!({ "user_id": 1, "segments": ["A", "MISSING"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("MISSING"), "{body}");

    // The user was never created.
    let (status, _) = send(&app, "GET", "/user/get?user_id=1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn negative_ttl_is_rejected() {
    let app = app().await;
    create(&app, "A").await;
    let (status, _) = send(
      &app,
      "POST",
      "/user/add",
      Some(json!({ "user_id": 1, "segments": ["A"], "ttl": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn oversized_ttl_is_rejected() {
    let app = app().await;
    create(&app, "A").await;
    let (status, body) = send(
      &app,
      "POST",
      "/user/add",
      Some(json!({ "user_id": 1, "segments": ["A"], "ttl": 100_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"), "{body}");

    // The user was never created.
    let (status, _) = send(&app, "GET", "/user/get?user_id=1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_user_is_404() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/user/get?user_id=42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("42"));

    let (status, _) = send(&app, "GET", "/user/get", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Reports ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn history_validates_the_period() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/report/?month=1&year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, "GET", "/report/?month=13&year=2024", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/report/?month=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn history_lists_the_month_events() {
    let start = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();
    let app = app_at(Arc::new(ManualClock::new(start))).await;
    create(&app, "A").await;
    let (status, _) =
      send(&app, "POST", "/user/add", Some(json!({ "user_id": 7, "segments": ["A"] }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/report/?month=1&year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      json!([{
        "user_id":   7,
        "segment":   "A",
        "operation": "add",
        "date":      "2024-01-05T09:00:00Z",
      }])
    );

    let (_, body) = send(&app, "GET", "/report/?month=2&year=2024", None).await;
    assert_eq!(body, json!([]));
  }

  #[tokio::test]
  async fn report_file_is_a_csv_download() {
    let app = app().await;

    let resp = send_raw(&app, "GET", "/report/file?month=1&year=2024", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    assert_eq!(
      headers[header::CONTENT_DISPOSITION],
      "attachment; filename=\"report_1_2024.csv\""
    );
    let etag = headers[header::ETAG].to_str().unwrap().to_string();

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"user_id,segment,operation,date\n");

    let resp = send_raw(
      &app,
      "GET",
      "/report/file?month=1&year=2024",
      vec![(header::IF_NONE_MATCH, etag.as_str())],
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
  }

  #[tokio::test]
  async fn report_link_without_delivery_is_503() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/report/link?month=1&year=2024", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn report_link_returns_uploaded_url() {
    let app = app_with(LinkOnly).await;
    let (status, body) = send(&app, "GET", "/report/link?month=1&year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      json!({ "link": "https://files.example.com/report_1_2024.csv" })
    );
  }
}

//! Segmenta HTTP server: configuration, report delivery over HTTP, and the
//! top-level router.

pub mod delivery;

use std::{path::{Path, PathBuf}, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use segmenta_core::{delivery::ReportDelivery, service::Segmentation, store::SegmentStore};
use serde::Deserialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SEGMENTA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  pub request_timeout_secs: u64,
  pub delivery:             DeliveryConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 "127.0.0.1".to_string(),
      port:                 8000,
      store_path:           PathBuf::from("segmenta.sqlite3"),
      request_timeout_secs: 30,
      delivery:             DeliveryConfig::default(),
    }
  }
}

/// Where report files are uploaded. Without `upload_url` link generation is
/// unavailable.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeliveryConfig {
  pub upload_url:   Option<String>,
  /// Base of returned links. Defaults to `upload_url`.
  pub public_url:   Option<String>,
  pub username:     Option<String>,
  pub password:     Option<String>,
  pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
  fn default() -> Self {
    Self {
      upload_url:   None,
      public_url:   None,
      username:     None,
      password:     None,
      timeout_secs: 30,
    }
  }
}

impl ServerConfig {
  /// Layer the TOML file at `path` (if present) under `SEGMENTA_*`
  /// environment variables. Nested keys use `__`, e.g.
  /// `SEGMENTA_DELIVERY__UPLOAD_URL`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_builder(Config::builder().add_source(File::from(path).required(false)))
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(
        Environment::with_prefix("SEGMENTA")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: `/health` at the root, the JSON API under
/// `/api/v1`, every request traced and bounded by `timeout`.
pub fn app<S, D>(service: Arc<Segmentation<S, D>>, timeout: Duration) -> Router
where
  S: SegmentStore + 'static,
  D: ReportDelivery + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api/v1", segmenta_api::api_router(service))
    .layer(TimeoutLayer::new(timeout))
    .layer(TraceLayer::new_for_http())
}

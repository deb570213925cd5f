//! [`HttpDelivery`]: uploads report files with an HTTP `PUT`.
//!
//! Works with any host that stores a `PUT` body under the request path and
//! serves it back from a public base URL (WebDAV shares, object stores behind
//! a signing proxy, …). Uploading the same name again replaces the file.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use segmenta_core::delivery::ReportDelivery;
use thiserror::Error;

use crate::DeliveryConfig;

#[derive(Debug, Error)]
pub enum DeliveryError {
  #[error("no upload url is configured")]
  NotConfigured,

  #[error("upload request failed")]
  Request(#[from] reqwest::Error),

  #[error("upload rejected with status {0}")]
  Rejected(StatusCode),
}

struct Target {
  upload_url: String,
  public_url: String,
  username:   Option<String>,
  password:   Option<String>,
}

/// Report delivery over HTTP. Holds one pooled [`reqwest::Client`].
pub struct HttpDelivery {
  client: Client,
  target: Option<Target>,
}

impl HttpDelivery {
  pub fn new(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    let target = config.upload_url.as_ref().map(|upload_url| Target {
      upload_url: upload_url.clone(),
      public_url: config
        .public_url
        .clone()
        .unwrap_or_else(|| upload_url.clone()),
      username:   config.username.clone(),
      password:   config.password.clone(),
    });

    Ok(Self { client, target })
  }
}

fn join(base: &str, name: &str) -> String { format!("{}/{}", base.trim_end_matches('/'), name) }

impl ReportDelivery for HttpDelivery {
  type Error = DeliveryError;

  fn is_available(&self) -> bool { self.target.is_some() }

  async fn upload(&self, name: String, content: Vec<u8>) -> Result<String, DeliveryError> {
    let target = self.target.as_ref().ok_or(DeliveryError::NotConfigured)?;

    let mut req = self
      .client
      .put(join(&target.upload_url, &name))
      .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
      .body(content);
    if let Some(username) = &target.username {
      req = req.basic_auth(username, target.password.as_ref());
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(DeliveryError::Rejected(resp.status()));
    }

    tracing::debug!(file = %name, status = %resp.status(), "report stored");
    Ok(join(&target.public_url, &name))
  }
}

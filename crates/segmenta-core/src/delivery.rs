//! Report delivery: publishing rendered reports to an external file host.

use std::future::Future;

/// An external host that stores report files and hands back shareable URLs.
///
/// History and file generation never depend on this collaborator; only link
/// generation does.
pub trait ReportDelivery: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether uploads can currently be attempted.
  fn is_available(&self) -> bool;

  /// Store `content` under `name`, replacing any previous file with that name,
  /// and return a URL for it.
  fn upload(
    &self,
    name: String,
    content: Vec<u8>,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}

/// A delivery that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelivery;

#[derive(Debug, thiserror::Error)]
#[error("no report delivery is configured")]
pub struct NotConfigured;

impl ReportDelivery for NoDelivery {
  type Error = NotConfigured;

  fn is_available(&self) -> bool { false }

  async fn upload(&self, _name: String, _content: Vec<u8>) -> Result<String, NotConfigured> {
    Err(NotConfigured)
  }
}

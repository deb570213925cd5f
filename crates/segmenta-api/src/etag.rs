//! ETag computation for rendered report files.
//!
//! The tag is a quoted SHA-256 hex digest of the file body, so a report whose
//! history has not changed keeps its ETag across requests.

use sha2::{Digest, Sha256};

/// Compute a strong ETag for `content`.
pub fn compute_etag(content: &[u8]) -> String {
  let hash = Sha256::digest(content);
  format!("\"{}\"", hex::encode(hash))
}

/// Whether an `If-None-Match` header value matches `etag`.
pub fn matches(if_none_match: &str, etag: &str) -> bool {
  if_none_match.trim() == "*"
    || if_none_match
      .split(',')
      .map(|tag| tag.trim().trim_start_matches("W/"))
      .any(|tag| tag == etag)
}

//! Typed errors returned by every backend call.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Error produced by the fetch client (and anything built on it).
///
/// `Clone` so a single in-flight request can hand the same outcome to every
/// caller attached to it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
  /// Connection refused, DNS failure, broken pipe, ...
  #[error("Network error: {0}")]
  Transport(String),

  /// No response within the per-call timeout
  #[error("Request timed out after {}s", .0.as_secs())]
  Timeout(Duration),

  /// 2xx response whose body did not match the expected shape
  #[error("Invalid response body: {0}")]
  Decode(String),

  /// Non-2xx response
  #[error("{message} (HTTP {status})")]
  Status {
    status: u16,
    message: String,
    body: Value,
  },
}

impl ApiError {
  /// HTTP status of the failure, 0 when no response was received.
  pub fn status(&self) -> u16 {
    match self {
      ApiError::Status { status, .. } => *status,
      ApiError::Transport(_) | ApiError::Timeout(_) | ApiError::Decode(_) => 0,
    }
  }

  /// 401 and 403 will not succeed until the user re-authenticates.
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, ApiError::Status { status: 401 | 403, .. })
  }

  /// Whether the retry policy may try the request again.
  pub fn is_retryable(&self) -> bool {
    !self.is_unauthorized()
  }

  /// Short message suitable for a status line.
  pub fn user_message(&self) -> String {
    match self {
      ApiError::Status { message, .. } => message.clone(),
      other => other.to_string(),
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Transport(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::Decode(err.to_string())
  }
}

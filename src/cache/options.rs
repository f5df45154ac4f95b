//! Per-query options and the retry policy.

use std::time::Duration;

use crate::api::ApiError;

/// How failed reads are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Additional attempts after the first failure
  pub max_retries: u32,
  /// Delay before the first retry; doubles for each following one
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 2,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  /// Never retry.
  #[cfg(test)]
  pub fn none() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  pub fn with_max_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = max_retries;
    self
  }

  /// Whether to try again after `retries_done` retries have already failed.
  ///
  /// Authorization failures are never retried.
  pub fn should_retry(&self, retries_done: u32, error: &ApiError) -> bool {
    retries_done < self.max_retries && error.is_retryable()
  }

  /// Delay before retry number `retries_done + 1`.
  pub fn delay_for(&self, retries_done: u32) -> Duration {
    let factor = 2u32.saturating_pow(retries_done);
    self.base_delay.saturating_mul(factor).min(self.max_delay)
  }
}

/// Options for a single read.
#[derive(Debug, Clone)]
pub struct QueryOptions {
  /// Age after which a cached value is refetched on the next read
  pub stale_after: Duration,
  /// How long an entry without subscribers is kept
  pub collect_after: Duration,
  /// Disabled queries never fetch
  pub enabled: bool,
  /// Mark the entry stale when the terminal regains focus
  pub refetch_on_focus: bool,
  pub retry: RetryPolicy,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_after: Duration::from_secs(2 * 60),
      collect_after: Duration::from_secs(10 * 60),
      enabled: true,
      refetch_on_focus: false,
      retry: RetryPolicy::default(),
    }
  }
}

impl QueryOptions {
  pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
    self.stale_after = stale_after;
    self
  }

  pub fn with_collect_after(mut self, collect_after: Duration) -> Self {
    self.collect_after = collect_after;
    self
  }

  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn with_refetch_on_focus(mut self, refetch_on_focus: bool) -> Self {
    self.refetch_on_focus = refetch_on_focus;
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::Value;

  fn status(code: u16) -> ApiError {
    ApiError::Status {
      status: code,
      message: String::new(),
      body: Value::Null,
    }
  }

  #[test]
  fn test_defaults() {
    let options = QueryOptions::default();
    assert_eq!(options.stale_after, Duration::from_secs(120));
    assert_eq!(options.collect_after, Duration::from_secs(600));
    assert!(options.enabled);
    assert!(!options.refetch_on_focus);
    assert_eq!(options.retry.max_retries, 2);
  }

  #[test]
  fn test_retry_budget() {
    let policy = RetryPolicy::default();
    assert!(policy.should_retry(0, &status(500)));
    assert!(policy.should_retry(1, &status(500)));
    assert!(!policy.should_retry(2, &status(500)));
  }

  #[test]
  fn test_never_retries_auth_failures() {
    let policy = RetryPolicy::default();
    assert!(!policy.should_retry(0, &status(401)));
    assert!(!policy.should_retry(0, &status(403)));
  }

  #[test]
  fn test_backoff_is_capped() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(4), Duration::from_secs(16));
    assert_eq!(policy.delay_for(5), Duration::from_secs(30));
    assert_eq!(policy.delay_for(40), Duration::from_secs(30));
  }
}

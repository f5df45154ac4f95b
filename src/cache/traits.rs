//! Result and snapshot types handed out by the query client.

use serde_json::Value;
use tokio::time::Instant;

use crate::api::ApiError;

/// Result from a read, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// Latest good value, if there is one
  pub data: Option<T>,
  /// Error from the most recent fetch, when it failed
  pub error: Option<ApiError>,
  /// Where the data came from
  pub source: CacheSource,
  /// When `data` was fetched
  pub fetched_at: Option<Instant>,
}

impl<T> CacheResult<T> {
  /// Fresh data from the network.
  pub fn from_network(data: T, fetched_at: Instant) -> Self {
    Self {
      data: Some(data),
      error: None,
      source: CacheSource::Network,
      fetched_at: Some(fetched_at),
    }
  }

  /// Data served from cache without a request.
  pub fn from_cache(data: T, fetched_at: Option<Instant>) -> Self {
    Self {
      data: Some(data),
      error: None,
      source: CacheSource::Cache,
      fetched_at,
    }
  }

  /// A fetch failed. Any previous value is kept alongside the error.
  pub fn failed(previous: Option<T>, fetched_at: Option<Instant>, error: ApiError) -> Self {
    let source = if previous.is_some() {
      CacheSource::StaleWhileError
    } else {
      CacheSource::Failed
    };
    Self {
      data: previous,
      error: Some(error),
      source,
      fetched_at,
    }
  }

  /// The query is disabled; whatever is cached is returned as-is.
  pub fn idle(data: Option<T>, error: Option<ApiError>, fetched_at: Option<Instant>) -> Self {
    Self {
      data,
      error,
      source: CacheSource::Idle,
      fetched_at,
    }
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

/// Indicates where the data of a [`CacheResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched by this read (or by a concurrent read it attached to)
  Network,
  /// Served from cache, still fresh
  Cache,
  /// Refetch failed, previously cached value returned with the error
  StaleWhileError,
  /// Fetch failed and nothing was cached
  Failed,
  /// Query disabled, no fetch attempted
  Idle,
}

/// What subscribers see of a cache entry.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
  pub data: Option<Value>,
  pub error: Option<ApiError>,
  pub fetched_at: Option<Instant>,
  /// A fetch is in flight
  pub fetching: bool,
  /// Marked stale by an invalidation or focus change
  pub invalidated: bool,
}

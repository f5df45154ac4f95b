//! Query client: deduplicated, cached, retried reads and invalidating writes.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::key::CacheKey;
use super::options::{QueryOptions, RetryPolicy};
use super::traits::{CacheResult, QuerySnapshot};
use crate::api::ApiError;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, ApiError>>>;

struct InFlight {
  id: u64,
  fetch: SharedFetch,
}

/// One cached read.
struct Entry {
  /// Distinguishes this entry from a later one under the same key
  id: u64,
  value: Option<Value>,
  fetched_at: Option<Instant>,
  error: Option<ApiError>,
  invalidated: bool,
  in_flight: Option<InFlight>,
  subscribers: usize,
  idle_since: Instant,
  stale_after: Duration,
  collect_after: Duration,
  refetch_on_focus: bool,
  notify: watch::Sender<QuerySnapshot>,
}

impl Entry {
  fn new(id: u64, options: &QueryOptions, now: Instant) -> Self {
    let (notify, _) = watch::channel(QuerySnapshot::default());
    Self {
      id,
      value: None,
      fetched_at: None,
      error: None,
      invalidated: false,
      in_flight: None,
      subscribers: 0,
      idle_since: now,
      stale_after: options.stale_after,
      collect_after: options.collect_after,
      refetch_on_focus: options.refetch_on_focus,
      notify,
    }
  }

  /// The most recent reader's options win.
  fn apply_options(&mut self, options: &QueryOptions) {
    self.stale_after = options.stale_after;
    self.collect_after = options.collect_after;
    self.refetch_on_focus = options.refetch_on_focus;
  }

  fn is_stale(&self, now: Instant) -> bool {
    self.invalidated
      || self
        .fetched_at
        .map(|t| now.saturating_duration_since(t) >= self.stale_after)
        .unwrap_or(true)
  }

  fn is_collectable(&self, now: Instant) -> bool {
    self.subscribers == 0
      && self.in_flight.is_none()
      && now.saturating_duration_since(self.idle_since) >= self.collect_after
  }

  fn snapshot(&self) -> QuerySnapshot {
    QuerySnapshot {
      data: self.value.clone(),
      error: self.error.clone(),
      fetched_at: self.fetched_at,
      fetching: self.in_flight.is_some(),
      invalidated: self.invalidated,
    }
  }

  fn publish(&self) {
    self.notify.send_replace(self.snapshot());
  }

  /// Mark stale and detach any pending fetch: it started before the change
  /// and must not land as fresh data. The next read starts a new fetch.
  fn invalidate(&mut self) {
    self.invalidated = true;
    self.in_flight = None;
    self.publish();
  }
}

#[derive(Default)]
struct State {
  entries: HashMap<CacheKey, Entry>,
  next_id: u64,
}

impl State {
  fn next_id(&mut self) -> u64 {
    self.next_id += 1;
    self.next_id
  }

  fn collect(&mut self, now: Instant) -> usize {
    let before = self.entries.len();
    self.entries.retain(|key, entry| {
      let keep = !entry.is_collectable(now);
      if !keep {
        debug!(%key, "Collecting idle cache entry");
      }
      keep
    });
    before - self.entries.len()
  }
}

#[derive(Default)]
struct Inner {
  state: Mutex<State>,
}

impl Inner {
  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store the outcome of fetch `id`, unless the entry has moved on since.
  fn settle(&self, key: &CacheKey, id: u64, result: &Result<Value, ApiError>) {
    let mut state = self.lock();
    let Some(entry) = state.entries.get_mut(key) else {
      debug!(%key, "Entry removed while fetching, dropping result");
      return;
    };
    if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
      return;
    }

    let now = Instant::now();
    entry.in_flight = None;
    match result {
      Ok(value) => {
        entry.value = Some(value.clone());
        entry.fetched_at = Some(now);
        entry.error = None;
        entry.invalidated = false;
      }
      Err(error) => {
        entry.error = Some(error.clone());
      }
    }
    if entry.subscribers == 0 {
      entry.idle_since = now;
    }
    entry.publish();
  }

  fn unsubscribe(&self, key: &CacheKey, entry_id: u64) {
    let mut state = self.lock();
    if let Some(entry) = state.entries.get_mut(key) {
      if entry.id != entry_id {
        return;
      }
      entry.subscribers = entry.subscribers.saturating_sub(1);
      if entry.subscribers == 0 {
        entry.idle_since = Instant::now();
      }
    }
  }
}

enum Plan<T> {
  Done(CacheResult<T>),
  Wait(SharedFetch),
}

/// In-memory cache of server state, keyed by [`CacheKey`].
///
/// Cheap to clone; clones share the same cache. Create one per session and
/// pass it to whatever needs it; [`QueryClient::clear`] tears it down.
#[derive(Clone, Default)]
pub struct QueryClient {
  inner: Arc<Inner>,
}

impl QueryClient {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read `key`, fetching with `fetcher` when nothing fresh is cached.
  ///
  /// 1. Disabled query: return whatever is cached, never fetch
  /// 2. Fetch already in flight for the key: wait for it
  /// 3. Fresh value cached: return it
  /// 4. Otherwise fetch (with retries) and store the result
  ///
  /// A failed fetch never clears the cached value; it is returned next to the
  /// error.
  pub async fn query<T, F, Fut>(
    &self,
    key: &CacheKey,
    options: &QueryOptions,
    fetcher: F,
  ) -> CacheResult<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let fetch = match self.plan(key, options, fetcher) {
      Plan::Done(result) => return result,
      Plan::Wait(fetch) => fetch,
    };

    let outcome = fetch.await;
    self.resolve(key, outcome)
  }

  fn plan<T, F, Fut>(&self, key: &CacheKey, options: &QueryOptions, fetcher: F) -> Plan<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let now = Instant::now();
    let mut guard = self.inner.lock();
    guard.collect(now);

    let id = guard.next_id();
    let entry = guard
      .entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(id, options, now));
    entry.apply_options(options);
    if entry.subscribers == 0 {
      entry.idle_since = now;
    }

    if !options.enabled {
      debug!(%key, "Query disabled, not fetching");
      return Plan::Done(CacheResult::idle(
        entry.value.as_ref().and_then(|v| decode(v).ok()),
        entry.error.clone(),
        entry.fetched_at,
      ));
    }

    if let Some(in_flight) = &entry.in_flight {
      debug!(%key, "Attaching to in-flight fetch");
      return Plan::Wait(in_flight.fetch.clone());
    }

    if !entry.is_stale(now) {
      if let Some(Ok(data)) = entry.value.as_ref().map(decode::<T>) {
        debug!(%key, "Cache hit");
        return Plan::Done(CacheResult::from_cache(data, entry.fetched_at));
      }
    }

    debug!(%key, "Cache miss, fetching");
    let fetch = spawn_fetch(
      Arc::clone(&self.inner),
      key.clone(),
      id,
      fetcher,
      options.retry.clone(),
    );
    entry.in_flight = Some(InFlight {
      id,
      fetch: fetch.clone(),
    });
    entry.publish();
    Plan::Wait(fetch)
  }

  fn resolve<T: DeserializeOwned>(
    &self,
    key: &CacheKey,
    outcome: Result<Value, ApiError>,
  ) -> CacheResult<T> {
    let (previous, fetched_at) = {
      let state = self.inner.lock();
      state
        .entries
        .get(key)
        .map(|e| (e.value.clone(), e.fetched_at))
        .unwrap_or((None, None))
    };

    match outcome {
      Ok(value) => match decode::<T>(&value) {
        Ok(data) => CacheResult::from_network(data, fetched_at.unwrap_or_else(Instant::now)),
        Err(error) => CacheResult::failed(None, None, error),
      },
      Err(error) => CacheResult::failed(
        previous.as_ref().and_then(|v| decode(v).ok()),
        fetched_at,
        error,
      ),
    }
  }

  /// Run a state-changing call once and invalidate `invalidate` on success.
  ///
  /// Never retried. On failure nothing in the cache changes.
  pub async fn mutate<T, Fut>(&self, mutation: Fut, invalidate: &[CacheKey]) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    match mutation.await {
      Ok(result) => {
        for key in invalidate {
          let count = self.invalidate(key);
          info!(%key, count, "Mutation succeeded, invalidated entries");
        }
        Ok(result)
      }
      Err(error) => {
        warn!(%error, "Mutation failed");
        Err(error)
      }
    }
  }

  /// Mark every entry under `prefix` stale. Returns how many were marked.
  pub fn invalidate(&self, prefix: &CacheKey) -> usize {
    let mut state = self.inner.lock();
    let mut count = 0;
    for (key, entry) in state.entries.iter_mut() {
      if key.starts_with(prefix) {
        entry.invalidate();
        count += 1;
      }
    }
    count
  }

  /// The terminal regained focus: mark watched entries that asked for it stale.
  pub fn focus_changed(&self) -> usize {
    let mut state = self.inner.lock();
    let mut count = 0;
    for entry in state.entries.values_mut() {
      if entry.refetch_on_focus && entry.subscribers > 0 {
        entry.invalidate();
        count += 1;
      }
    }
    count
  }

  /// Register interest in `key`. The entry is not collected while any
  /// subscription to it is alive.
  pub fn subscribe(&self, key: &CacheKey, options: &QueryOptions) -> Subscription {
    let now = Instant::now();
    let mut guard = self.inner.lock();
    let id = guard.next_id();
    let entry = guard
      .entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(id, options, now));
    entry.apply_options(options);
    entry.subscribers += 1;

    Subscription {
      key: key.clone(),
      entry_id: entry.id,
      inner: Arc::downgrade(&self.inner),
      rx: entry.notify.subscribe(),
    }
  }

  /// Cached value for `key`, without fetching.
  #[allow(dead_code)]
  pub fn get_query_data<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
    let state = self.inner.lock();
    let value = state.entries.get(key)?.value.as_ref()?;
    decode(value).ok()
  }

  /// Seed or overwrite the cached value for `key` as if it was just fetched.
  #[allow(dead_code)]
  pub fn set_query_data<T: Serialize>(&self, key: &CacheKey, data: &T) -> Result<(), ApiError> {
    let value = serde_json::to_value(data)?;
    let now = Instant::now();
    let mut guard = self.inner.lock();
    let id = guard.next_id();
    let entry = guard
      .entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(id, &QueryOptions::default(), now));
    entry.value = Some(value);
    entry.fetched_at = Some(now);
    entry.error = None;
    entry.invalidated = false;
    entry.publish();
    Ok(())
  }

  #[allow(dead_code)]
  pub fn remove(&self, key: &CacheKey) -> bool {
    self.inner.lock().entries.remove(key).is_some()
  }

  /// Drop everything, e.g. when a long-lived client's session ends.
  #[allow(dead_code)]
  pub fn clear(&self) {
    let mut state = self.inner.lock();
    let count = state.entries.len();
    state.entries.clear();
    info!(count, "Cleared query cache");
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.inner.lock().entries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Drop entries that have been unused for longer than their collect window.
  pub fn collect_garbage(&self) -> usize {
    self.inner.lock().collect(Instant::now())
  }

  /// Sweep idle entries every `every`. Stops once the client is dropped.
  pub fn spawn_collector(&self, every: Duration) -> JoinHandle<()> {
    let inner = Arc::downgrade(&self.inner);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.tick().await;
      loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
          break;
        };
        let removed = inner.lock().collect(Instant::now());
        if removed > 0 {
          debug!(removed, "Collected idle cache entries");
        }
      }
    })
  }
}

/// Live view of one cache entry. Dropping it starts the entry's idle clock.
pub struct Subscription {
  key: CacheKey,
  entry_id: u64,
  inner: Weak<Inner>,
  rx: watch::Receiver<QuerySnapshot>,
}

impl Subscription {
  #[cfg(test)]
  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  pub fn snapshot(&self) -> QuerySnapshot {
    self.rx.borrow().clone()
  }

  /// Wait for the entry to change. Returns false once the entry is gone.
  #[cfg(test)]
  pub async fn changed(&mut self) -> bool {
    self.rx.changed().await.is_ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.inner.upgrade() {
      inner.unsubscribe(&self.key, self.entry_id);
    }
  }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, ApiError> {
  Ok(T::deserialize(value)?)
}

/// Run the fetch on its own task so it completes (and lands in the cache)
/// even if every caller waiting on it goes away.
fn spawn_fetch<T, F, Fut>(
  inner: Arc<Inner>,
  key: CacheKey,
  id: u64,
  fetcher: F,
  retry: RetryPolicy,
) -> SharedFetch
where
  T: Serialize + Send + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
  let weak = Arc::downgrade(&inner);
  let task_key = key.clone();
  let task = tokio::spawn(async move {
    let result = fetch_with_retry(&task_key, &fetcher, &retry).await;
    inner.settle(&task_key, id, &result);
    result
  });

  async move {
    match task.await {
      Ok(result) => result,
      Err(e) => {
        let error = ApiError::Transport(format!("Fetch task failed: {}", e));
        if let Some(inner) = weak.upgrade() {
          inner.settle(&key, id, &Err(error.clone()));
        }
        Err(error)
      }
    }
  }
  .boxed()
  .shared()
}

async fn fetch_with_retry<T, F, Fut>(
  key: &CacheKey,
  fetcher: &F,
  retry: &RetryPolicy,
) -> Result<Value, ApiError>
where
  T: Serialize,
  F: Fn() -> Fut,
  Fut: Future<Output = Result<T, ApiError>>,
{
  let mut retries_done = 0;
  loop {
    match fetcher().await {
      Ok(data) => return Ok(serde_json::to_value(data)?),
      Err(error) => {
        if !retry.should_retry(retries_done, &error) {
          warn!(%key, %error, retries = retries_done, "Query failed");
          return Err(error);
        }
        let delay = retry.delay_for(retries_done);
        retries_done += 1;
        warn!(%key, %error, attempt = retries_done, ?delay, "Query failed, retrying");
        tokio::time::sleep(delay).await;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use serde_json::json;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  fn status(code: u16) -> ApiError {
    ApiError::Status {
      status: code,
      message: format!("HTTP {}", code),
      body: Value::Null,
    }
  }

  /// Fetcher that counts calls and answers `value` after `delay`.
  fn counting<T>(
    calls: &Arc<AtomicUsize>,
    value: T,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<T, ApiError>> + Clone + Send + Sync + 'static
  where
    T: Clone + Send + Sync + 'static,
  {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      let value = value.clone();
      async move {
        tokio::time::sleep(delay).await;
        Ok(value)
      }
      .boxed()
    }
  }

  fn failing(
    calls: &Arc<AtomicUsize>,
    code: u16,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, ApiError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { Err(status(code)) }.boxed()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_reads_share_one_fetch() {
    let client = QueryClient::new();
    let key = CacheKey::from(["team", "members"]);
    let options = QueryOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting(&calls, vec!["ana".to_string()], Duration::from_millis(100));

    let (a, b) = tokio::join!(
      client.query(&key, &options, fetcher.clone()),
      client.query(&key, &options, fetcher),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, Some(vec!["ana".to_string()]));
    assert_eq!(a.data, b.data);
    assert_eq!(a.source, CacheSource::Network);
    assert_eq!(b.source, CacheSource::Network);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_reads_hit_cache_until_stale() {
    let client = QueryClient::new();
    let key = CacheKey::from(["projects"]);
    let options = QueryOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting(&calls, 3u32, Duration::ZERO);

    let first = client.query(&key, &options, fetcher.clone()).await;
    assert_eq!(first.source, CacheSource::Network);

    tokio::time::advance(Duration::from_secs(60)).await;
    let second = client.query(&key, &options, fetcher.clone()).await;
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, Some(3));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    let third = client.query(&key, &options, fetcher).await;
    assert_eq!(third.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_forbidden_is_not_retried() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let result = client
      .query(
        &CacheKey::from(["secrets"]),
        &QueryOptions::default(),
        failing(&calls, 403),
      )
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.error.map(|e| e.status()), Some(403));
    assert_eq!(result.source, CacheSource::Failed);
    assert!(result.data.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_unauthorized_is_not_retried() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let result = client
      .query(
        &CacheKey::from(["secrets"]),
        &QueryOptions::default(),
        failing(&calls, 401),
      )
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(result.error.is_some_and(|e| e.is_unauthorized()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_server_errors_are_retried() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::default();

    let result = client
      .query(&CacheKey::from(["findings"]), &options, failing(&calls, 500))
      .await;

    assert_eq!(
      calls.load(Ordering::SeqCst),
      1 + options.retry.max_retries as usize
    );
    assert_eq!(result.error.map(|e| e.status()), Some(500));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_recovers() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fetcher = move || {
      let attempt = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        if attempt == 0 {
          Err(status(503))
        } else {
          Ok(9u32)
        }
      }
    };

    let result = client
      .query(&CacheKey::from(["flaky"]), &QueryOptions::default(), fetcher)
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.data, Some(9));
    assert!(result.error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_refresh_keeps_previous_value() {
    let client = QueryClient::new();
    let key = CacheKey::from(["module", "siem"]);
    let options = QueryOptions::default().with_retry(RetryPolicy::none());
    let fail = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fail);
    let fetcher = move || {
      let fail = flag.load(Ordering::SeqCst);
      async move {
        if fail {
          Err(status(500))
        } else {
          Ok(json!({ "alerts": 12 }))
        }
      }
    };

    let first = client.query(&key, &options, fetcher.clone()).await;
    assert_eq!(first.data, Some(json!({ "alerts": 12 })));

    fail.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(180)).await;
    let second: CacheResult<Value> = client.query(&key, &options, fetcher).await;

    assert_eq!(second.source, CacheSource::StaleWhileError);
    assert_eq!(second.data, Some(json!({ "alerts": 12 })));
    assert!(second.error.is_some());
    assert_eq!(
      client.get_query_data::<Value>(&key),
      Some(json!({ "alerts": 12 }))
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutation_invalidates_keys() {
    let client = QueryClient::new();
    let key = CacheKey::from(["team", "members"]);
    let options = QueryOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting(&calls, 1u32, Duration::ZERO);

    client.query(&key, &options, fetcher.clone()).await;
    let invited = client
      .mutate(async { Ok::<_, ApiError>("invited") }, &[key.clone()])
      .await;
    assert_eq!(invited.unwrap(), "invited");

    let after = client.query(&key, &options, fetcher).await;
    assert_eq!(after.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutation_during_fetch_forces_new_fetch() {
    let client = QueryClient::new();
    let key = CacheKey::from(["team", "members"]);
    let options = QueryOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = {
      let calls = Arc::clone(&calls);
      move || {
        let version = calls.fetch_add(1, Ordering::SeqCst) as u32;
        async move {
          tokio::time::sleep(Duration::from_millis(100)).await;
          Ok::<_, ApiError>(version)
        }
        .boxed()
      }
    };

    let pending = tokio::spawn({
      let (client, key, options, fetcher) =
        (client.clone(), key.clone(), options.clone(), fetcher.clone());
      async move { client.query(&key, &options, fetcher).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    client
      .mutate(async { Ok::<_, ApiError>(()) }, &[key.clone()])
      .await
      .unwrap();
    assert!(!client.subscribe(&key, &options).snapshot().fetching);

    // The fetch that started before the mutation still answers its caller
    let before = pending.await.unwrap();
    assert_eq!(before.data, Some(0));

    tokio::time::sleep(Duration::from_millis(10)).await;
    let after = client.query(&key, &options, fetcher).await;
    assert_eq!(after.source, CacheSource::Network);
    assert_eq!(after.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_mutation_runs_once_and_leaves_cache() {
    let client = QueryClient::new();
    let key = CacheKey::from(["team", "members"]);
    let options = QueryOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting(&calls, 1u32, Duration::ZERO);
    client.query(&key, &options, fetcher.clone()).await;

    let attempts = AtomicUsize::new(0);
    let result = client
      .mutate(
        async {
          attempts.fetch_add(1, Ordering::SeqCst);
          Err::<(), _>(status(500))
        },
        &[key.clone()],
      )
      .await;

    assert_eq!(result.unwrap_err().status(), 500);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let after = client.query(&key, &options, fetcher).await;
    assert_eq!(after.source, CacheSource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidation_matches_prefix() {
    let client = QueryClient::new();
    for key in [
      CacheKey::from(["projects"]),
      CacheKey::from(["projects", "1", "findings"]),
      CacheKey::from(["team"]),
    ] {
      client.set_query_data(&key, &1u32).unwrap();
    }

    assert_eq!(client.invalidate(&CacheKey::from(["projects"])), 2);
    assert_eq!(client.invalidate(&CacheKey::from(["nothing"])), 0);
  }

  #[tokio::test]
  async fn test_disabled_query_never_fetches() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::default().enabled(false);

    let result = client
      .query(
        &CacheKey::from(["audit"]),
        &options,
        counting(&calls, 1u32, Duration::ZERO),
      )
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.source, CacheSource::Idle);
    assert!(result.data.is_none());
    assert!(result.error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_idle_entries_are_collected() {
    let client = QueryClient::new();
    let key = CacheKey::from(["pam", "sessions"]);
    let options = QueryOptions::default().with_collect_after(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting(&calls, 1u32, Duration::ZERO);

    client.query(&key, &options, fetcher.clone()).await;
    assert_eq!(client.len(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(client.collect_garbage(), 0);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(client.collect_garbage(), 1);
    assert!(client.is_empty());

    let again = client.query(&key, &options, fetcher).await;
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_subscribed_entries_are_kept() {
    let client = QueryClient::new();
    let key = CacheKey::from(["iot", "devices"]);
    let options = QueryOptions::default().with_collect_after(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let subscription = client.subscribe(&key, &options);
    client
      .query(&key, &options, counting(&calls, 1u32, Duration::ZERO))
      .await;

    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(client.collect_garbage(), 0);

    drop(subscription);
    assert_eq!(client.collect_garbage(), 0);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(client.collect_garbage(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_subscribers_are_notified() {
    let client = QueryClient::new();
    let key = CacheKey::from(["dns", "queries"]);
    let options = QueryOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut subscription = client.subscribe(&key, &options);

    let background = client.clone();
    let fetch_key = key.clone();
    let fetcher = counting(&calls, json!(5), Duration::from_millis(50));
    tokio::spawn(async move {
      background.query(&fetch_key, &options, fetcher).await;
    });

    loop {
      assert!(subscription.changed().await);
      if subscription.snapshot().data.is_some() {
        break;
      }
    }

    let snapshot = subscription.snapshot();
    assert_eq!(snapshot.data, Some(json!(5)));
    assert!(!snapshot.fetching);
    assert!(snapshot.fetched_at.is_some());
  }

  #[tokio::test]
  async fn test_focus_marks_only_opted_in_watched_entries() {
    let client = QueryClient::new();
    let opted_in = QueryOptions::default().with_refetch_on_focus(true);
    let default = QueryOptions::default();

    let _watched = client.subscribe(&CacheKey::from(["a"]), &opted_in);
    let _watched_default = client.subscribe(&CacheKey::from(["b"]), &default);
    client.set_query_data(&CacheKey::from(["c"]), &1u32).unwrap();

    assert_eq!(client.focus_changed(), 1);
  }

  #[tokio::test]
  async fn test_seeded_data_is_served_without_fetch() {
    let client = QueryClient::new();
    let key = CacheKey::from(["waf", "rules"]);
    let calls = Arc::new(AtomicUsize::new(0));
    client.set_query_data(&key, &vec![1u32, 2]).unwrap();

    let result = client
      .query(
        &key,
        &QueryOptions::default(),
        counting(&calls, vec![9u32], Duration::ZERO),
      )
      .await;

    assert_eq!(result.data, Some(vec![1, 2]));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(client.remove(&key));
    assert_eq!(client.get_query_data::<Vec<u32>>(&key), None);
  }

  #[tokio::test]
  async fn test_clear_drops_everything() {
    let client = QueryClient::new();
    client.set_query_data(&CacheKey::from(["a"]), &1u32).unwrap();
    client.set_query_data(&CacheKey::from(["b"]), &2u32).unwrap();
    let subscription = client.subscribe(&CacheKey::from(["a"]), &QueryOptions::default());

    client.clear();
    assert!(client.is_empty());

    // A stale subscription must not disturb a new entry under the same key
    let _fresh = client.subscribe(
      &CacheKey::from(["a"]),
      &QueryOptions::default().with_collect_after(Duration::ZERO),
    );
    drop(subscription);
    assert_eq!(client.collect_garbage(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_background_collector() {
    let client = QueryClient::new();
    let key = CacheKey::from(["siem", "events"]);
    let options = QueryOptions::default().with_collect_after(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let handle = client.spawn_collector(Duration::from_secs(30));

    client
      .query(&key, &options, counting(&calls, 1u32, Duration::ZERO))
      .await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(client.is_empty());

    drop(client);
    let stopped = tokio::time::timeout(Duration::from_secs(60), handle).await;
    assert!(stopped.is_ok());
  }
}

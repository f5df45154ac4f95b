//! Test doubles for the auth and backend collaborators.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{ApiError, Backend};
use crate::session::AuthProvider;

/// Auth provider with a fixed answer.
pub struct StaticAuth {
  demo: bool,
  token: Option<String>,
}

impl StaticAuth {
  pub fn demo() -> Self {
    Self {
      demo: true,
      token: None,
    }
  }

  pub fn live(token: Option<&str>) -> Self {
    Self {
      demo: false,
      token: token.map(String::from),
    }
  }
}

impl AuthProvider for StaticAuth {
  fn is_demo_mode(&self) -> bool {
    self.demo
  }

  fn token(&self) -> Option<String> {
    self.token.clone()
  }
}

/// Backend with canned replies and call counters.
pub struct FakeBackend {
  state_reply: Mutex<Result<Value, ApiError>>,
  analyze_reply: Mutex<Result<Value, ApiError>>,
  state_delay: Duration,
  analyze_delay: Duration,
  pub state_calls: AtomicUsize,
  pub analyze_calls: AtomicUsize,
  pub analyze_completed: Arc<AtomicUsize>,
  pub scan_calls: AtomicUsize,
  pub last_prompt: Mutex<Option<String>>,
}

impl FakeBackend {
  pub fn new() -> Self {
    Self {
      state_reply: Mutex::new(Ok(json!({}))),
      analyze_reply: Mutex::new(Err(ApiError::Transport("connection refused".into()))),
      state_delay: Duration::ZERO,
      analyze_delay: Duration::ZERO,
      state_calls: AtomicUsize::new(0),
      analyze_calls: AtomicUsize::new(0),
      analyze_completed: Arc::new(AtomicUsize::new(0)),
      scan_calls: AtomicUsize::new(0),
      last_prompt: Mutex::new(None),
    }
  }

  pub fn with_state(self, reply: Result<Value, ApiError>) -> Self {
    self.set_state(reply);
    self
  }

  pub fn with_analysis(self, reply: Result<Value, ApiError>) -> Self {
    *self.analyze_reply.lock().unwrap() = reply;
    self
  }

  pub fn with_state_delay(mut self, delay: Duration) -> Self {
    self.state_delay = delay;
    self
  }

  pub fn with_analyze_delay(mut self, delay: Duration) -> Self {
    self.analyze_delay = delay;
    self
  }

  pub fn set_state(&self, reply: Result<Value, ApiError>) {
    *self.state_reply.lock().unwrap() = reply;
  }

  pub fn state_calls(&self) -> usize {
    self.state_calls.load(Ordering::SeqCst)
  }

  pub fn analyze_calls(&self) -> usize {
    self.analyze_calls.load(Ordering::SeqCst)
  }
}

impl Backend for FakeBackend {
  fn get_dashboard_state(&self, _module: &str) -> BoxFuture<'static, Result<Value, ApiError>> {
    self.state_calls.fetch_add(1, Ordering::SeqCst);
    let reply = self.state_reply.lock().unwrap().clone();
    let delay = self.state_delay;
    async move {
      tokio::time::sleep(delay).await;
      reply
    }
    .boxed()
  }

  fn analyze(&self, _module: &str, prompt: &str) -> BoxFuture<'static, Result<Value, ApiError>> {
    self.analyze_calls.fetch_add(1, Ordering::SeqCst);
    *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
    let reply = self.analyze_reply.lock().unwrap().clone();
    let delay = self.analyze_delay;
    let completed = Arc::clone(&self.analyze_completed);
    async move {
      tokio::time::sleep(delay).await;
      completed.fetch_add(1, Ordering::SeqCst);
      reply
    }
    .boxed()
  }

  fn trigger_scan(&self, _module: &str) -> BoxFuture<'static, Result<Value, ApiError>> {
    self.scan_calls.fetch_add(1, Ordering::SeqCst);
    async { Ok(json!({ "status": "queued" })) }.boxed()
  }
}

//! Per-screen data access: demo or live data plus an on-demand AI analysis.
//!
//! Follows the same spawn-and-poll shape as the rest of the app: background
//! work reports back over a channel and the owning screen applies updates on
//! its tick.
//!
//! # Example
//!
//! ```ignore
//! let mut waf = ctx.use_module_data("waf", demo_dataset);
//!
//! // In event loop tick
//! if waf.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // On key press
//! waf.run_analysis(None);
//! ```

mod analysis;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::cache::{CacheKey, CacheResult, QueryClient, QueryOptions, Subscription};
use crate::session::AuthProvider;

/// Collaborators every screen needs, passed down from the app.
#[derive(Clone)]
pub struct ModuleContext {
  pub auth: Arc<dyn AuthProvider>,
  pub backend: Arc<dyn Backend>,
  pub queries: QueryClient,
  /// Options for the module state queries
  pub options: QueryOptions,
}

impl ModuleContext {
  pub fn new(
    auth: Arc<dyn AuthProvider>,
    backend: Arc<dyn Backend>,
    queries: QueryClient,
    options: QueryOptions,
  ) -> Self {
    Self {
      auth,
      backend,
      queries,
      options,
    }
  }

  /// Create and mount the data hook for one screen.
  pub fn use_module_data<T>(&self, module: &str, demo: T) -> ModuleData<T>
  where
    T: Clone + DeserializeOwned + Send + 'static,
  {
    let mut data = ModuleData::new(self.clone(), module, demo);
    data.mount();
    data
  }
}

/// Where a screen's primary data currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Not mounted yet
  Idle,
  /// Demo mode: bundled data, no network
  DemoReady,
  /// Live mode, fetch in progress
  Loading,
  /// Live mode, backend data shown
  Live,
  /// Live mode, last fetch failed
  LiveError,
}

/// Everything a screen renders from.
#[derive(Debug, Clone)]
pub struct ModuleState<T> {
  /// Demo dataset or live result; never missing
  pub data: T,
  pub loading: bool,
  pub error: Option<String>,
  pub analyzing: bool,
  pub analysis_result: Option<String>,
  pub is_demo_mode: bool,
  /// When live data last arrived
  pub updated_at: Option<DateTime<Utc>>,
}

enum ModuleUpdate {
  Loaded {
    generation: u64,
    result: CacheResult<Value>,
  },
  Analyzed {
    generation: u64,
    text: String,
  },
}

/// Data hook for one dashboard screen.
///
/// Dropping it (unmounting the screen) aborts outstanding work so no update
/// lands on a screen that is gone.
pub struct ModuleData<T> {
  module: String,
  demo: T,
  ctx: ModuleContext,
  state: ModuleState<T>,
  phase: Phase,
  has_live_data: bool,
  tx: mpsc::UnboundedSender<ModuleUpdate>,
  rx: mpsc::UnboundedReceiver<ModuleUpdate>,
  fetch_task: Option<JoinHandle<()>>,
  analysis_task: Option<JoinHandle<()>>,
  fetch_generation: u64,
  analysis_generation: u64,
  subscription: Option<Subscription>,
}

impl<T> ModuleData<T>
where
  T: Clone + DeserializeOwned + Send + 'static,
{
  /// Create an unmounted hook. `data` is seeded with `demo` right away.
  pub fn new(ctx: ModuleContext, module: &str, demo: T) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      module: module.to_string(),
      state: ModuleState {
        data: demo.clone(),
        loading: false,
        error: None,
        analyzing: false,
        analysis_result: None,
        is_demo_mode: true,
        updated_at: None,
      },
      demo,
      ctx,
      phase: Phase::Idle,
      has_live_data: false,
      tx,
      rx,
      fetch_task: None,
      analysis_task: None,
      fetch_generation: 0,
      analysis_generation: 0,
      subscription: None,
    }
  }

  pub fn module(&self) -> &str {
    &self.module
  }

  pub fn state(&self) -> &ModuleState<T> {
    &self.state
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn is_demo_mode(&self) -> bool {
    self.state.is_demo_mode
  }

  /// Whether `data` holds something the backend returned (as opposed to the
  /// demo seed).
  pub fn has_live_data(&self) -> bool {
    self.has_live_data
  }

  fn key(&self) -> CacheKey {
    CacheKey::module(&self.module)
  }

  /// Decide demo vs live and start the initial load. No-op once mounted.
  pub fn mount(&mut self) {
    if self.phase != Phase::Idle {
      return;
    }

    self.state.is_demo_mode = self.ctx.auth.is_demo_mode();
    if self.state.is_demo_mode {
      info!(module = %self.module, "Demo mode, serving bundled data");
      self.apply_demo();
    } else {
      info!(module = %self.module, "Live mode, loading from backend");
      self.subscription = Some(self.ctx.queries.subscribe(&self.key(), &self.ctx.options));
      self.start_fetch();
    }
  }

  /// Reload primary data. In demo mode this just re-applies the bundled data.
  pub fn refresh(&mut self) {
    match self.phase {
      Phase::Idle => self.mount(),
      Phase::DemoReady => self.apply_demo(),
      Phase::Loading | Phase::Live | Phase::LiveError => {
        self.ctx.queries.invalidate(&self.key());
        self.start_fetch();
      }
    }
  }

  fn apply_demo(&mut self) {
    self.state.data = self.demo.clone();
    self.state.loading = false;
    self.state.error = None;
    self.phase = Phase::DemoReady;
  }

  fn start_fetch(&mut self) {
    if let Some(task) = self.fetch_task.take() {
      task.abort();
    }
    self.fetch_generation += 1;
    self.state.loading = true;
    self.phase = Phase::Loading;

    let generation = self.fetch_generation;
    let queries = self.ctx.queries.clone();
    let options = self.ctx.options.clone();
    let backend = Arc::clone(&self.ctx.backend);
    let module = self.module.clone();
    let key = self.key();
    let tx = self.tx.clone();

    self.fetch_task = Some(tokio::spawn(async move {
      let result = queries
        .query(&key, &options, move || backend.get_dashboard_state(&module))
        .await;
      let _ = tx.send(ModuleUpdate::Loaded { generation, result });
    }));
  }

  /// Ask the backend for an analysis of this module.
  ///
  /// Never fails: if the backend cannot answer, the result is a readable
  /// placeholder. Supersedes any analysis still running.
  pub fn run_analysis(&mut self, prompt: Option<&str>) {
    if let Some(task) = self.analysis_task.take() {
      task.abort();
    }
    self.analysis_generation += 1;
    self.state.analyzing = true;
    self.state.analysis_result = None;

    let generation = self.analysis_generation;
    let prompt = prompt
      .map(String::from)
      .unwrap_or_else(|| analysis::default_prompt(&self.module));
    let request = self.ctx.backend.analyze(&self.module, &prompt);
    let module = self.module.clone();
    let demo = self.state.is_demo_mode;
    let tx = self.tx.clone();

    debug!(module = %module, %prompt, "Running analysis");
    self.analysis_task = Some(tokio::spawn(async move {
      let text = match request.await {
        Ok(reply) => analysis::reply_text(reply),
        Err(error) => {
          warn!(module = %module, %error, "Analysis failed, using fallback text");
          analysis::fallback_message(&module, demo)
        }
      };
      let _ = tx.send(ModuleUpdate::Analyzed { generation, text });
    }));
  }

  pub fn clear_analysis(&mut self) {
    self.state.analysis_result = None;
  }

  /// Apply pending updates without blocking. Returns `true` if state changed.
  ///
  /// Also refetches when the cached entry was invalidated (by a mutation or a
  /// focus change) while live data was showing.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(update) = self.rx.try_recv() {
      self.apply(update);
      changed = true;
    }

    let invalidated = self
      .subscription
      .as_ref()
      .is_some_and(|s| s.snapshot().invalidated);
    if invalidated && self.phase == Phase::Live {
      debug!(module = %self.module, "Cache entry invalidated, refetching");
      self.start_fetch();
      changed = true;
    }

    changed
  }

  /// Wait for the next update and apply it.
  #[allow(dead_code)]
  pub async fn next_update(&mut self) -> bool {
    match self.rx.recv().await {
      Some(update) => {
        self.apply(update);
        true
      }
      None => false,
    }
  }

  fn apply(&mut self, update: ModuleUpdate) {
    match update {
      ModuleUpdate::Loaded { generation, result } if generation == self.fetch_generation => {
        self.fetch_task = None;
        self.apply_loaded(result);
      }
      ModuleUpdate::Analyzed { generation, text } if generation == self.analysis_generation => {
        self.analysis_task = None;
        self.state.analyzing = false;
        self.state.analysis_result = Some(text);
      }
      _ => debug!(module = %self.module, "Dropping superseded update"),
    }
  }

  fn apply_loaded(&mut self, result: CacheResult<Value>) {
    self.state.loading = false;

    let data = match result.data.map(serde_json::from_value::<T>).transpose() {
      Ok(data) => data,
      Err(e) => {
        warn!(module = %self.module, error = %e, "Backend returned unexpected data");
        self.state.error = Some(format!("Unexpected data for {}: {}", self.module, e));
        self.phase = Phase::LiveError;
        return;
      }
    };

    if let Some(data) = data {
      self.state.data = data;
      self.has_live_data = true;
      if result.error.is_none() {
        self.state.updated_at = Some(Utc::now());
      }
    }

    match result.error {
      Some(error) => {
        warn!(module = %self.module, %error, "Failed to load module data");
        self.state.error = Some(error.user_message());
        self.phase = Phase::LiveError;
      }
      None => {
        self.state.error = None;
        self.phase = Phase::Live;
      }
    }
  }
}

impl<T> Drop for ModuleData<T> {
  fn drop(&mut self) {
    if let Some(task) = self.analysis_task.take() {
      task.abort();
    }
    if let Some(task) = self.fetch_task.take() {
      task.abort();
    }
  }
}

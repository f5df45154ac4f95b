use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{QueryOptions, RetryPolicy};

/// Local development backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Module shown at startup (defaults to the first in the catalog)
  pub default_module: Option<String>,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Upper bound for a single backend call
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub stale_after_secs: u64,
  pub collect_after_secs: u64,
  /// Additional attempts for failed reads (auth failures are never retried)
  pub retry_count: u32,
  pub refetch_on_focus: bool,
  /// How often idle entries are swept
  pub gc_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let defaults = QueryOptions::default();
    Self {
      stale_after_secs: defaults.stale_after.as_secs(),
      collect_after_secs: defaults.collect_after.as_secs(),
      retry_count: defaults.retry.max_retries,
      refetch_on_focus: defaults.refetch_on_focus,
      gc_interval_secs: 60,
    }
  }
}

impl CacheConfig {
  pub fn query_options(&self) -> QueryOptions {
    QueryOptions::default()
      .with_stale_after(Duration::from_secs(self.stale_after_secs))
      .with_collect_after(Duration::from_secs(self.collect_after_secs))
      .with_refetch_on_focus(self.refetch_on_focus)
      .with_retry(RetryPolicy::default().with_max_retries(self.retry_count))
  }

  pub fn gc_interval(&self) -> Duration {
    Duration::from_secs(self.gc_interval_secs.max(1))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./secdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/secdash/config.yaml
  ///
  /// Without a file the defaults are used. Environment overrides are applied
  /// last.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("secdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("secdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// SECDASH_API_URL replaces the configured backend URL.
  fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(url) = var("SECDASH_API_URL").filter(|u| !u.trim().is_empty()) {
      self.api.url = url;
    }
    self
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.api.request_timeout_secs.max(1))
  }

  /// Demo mode forced through SECDASH_DEMO (`1`/`true` or `0`/`false`).
  pub fn demo_from_env() -> Option<bool> {
    parse_bool(&std::env::var("SECDASH_DEMO").ok()?)
  }

  /// Token handed in through SECDASH_TOKEN.
  pub fn token_from_env() -> Option<String> {
    std::env::var("SECDASH_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}

fn parse_bool(value: &str) -> Option<bool> {
  match value.trim().to_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

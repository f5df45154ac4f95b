mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod module;
mod modules;
mod session;
mod ui;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiClient, HttpBackend};
use crate::cache::QueryClient;
use crate::module::ModuleContext;
use crate::session::{AuthProvider, Session, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "secdash")]
#[command(about = "A terminal security dashboard with demo and live modes")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/secdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Module to open first (name or alias, e.g. waf, dns, siem)
  #[arg(short, long)]
  module: Option<String>,

  /// Always show bundled demo data
  #[arg(long, conflicts_with = "live")]
  demo: bool,

  /// Always talk to the backend, even without a stored token
  #[arg(long)]
  live: bool,

  /// Store a bearer token for the backend (also read from SECDASH_TOKEN)
  #[arg(long, conflicts_with = "logout")]
  token: Option<String>,

  /// Forget the stored token and start in demo mode
  #[arg(long)]
  logout: bool,
}

impl Args {
  fn demo_override(&self) -> Option<bool> {
    if self.demo {
      Some(true)
    } else if self.live {
      Some(false)
    } else {
      config::Config::demo_from_env()
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logging is best effort: a read-only data dir should not stop the dashboard
  let _log_guard = match logging::init() {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("secdash: logging disabled: {}", e);
      None
    }
  };

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(module) = &args.module {
    if modules::find(module).is_none() {
      return Err(eyre!("Unknown module: {}", module));
    }
    config.default_module = Some(module.clone());
  }

  let store = match SessionStore::open() {
    Ok(store) => Some(store),
    Err(e) => {
      warn!(error = %e, "Session store unavailable, running in demo mode");
      None
    }
  };
  let session = Arc::new(Session::new(store, args.demo_override()));
  let queries = QueryClient::new();

  if args.logout {
    session.logout()?;
  } else if let Some(token) = args.token.clone().or_else(config::Config::token_from_env) {
    session.login(&token)?;
  }

  let auth: Arc<dyn AuthProvider> = session;
  let client = ApiClient::new(&config.api.url, config.request_timeout(), Arc::clone(&auth))?;
  info!(
    url = client.base_url(),
    demo = auth.is_demo_mode(),
    "Starting secdash"
  );

  let backend = Arc::new(HttpBackend::new(client));
  let _collector = queries.spawn_collector(config.cache.gc_interval());

  let ctx = ModuleContext::new(auth, backend, queries, config.cache.query_options());

  // Initialize and run the app
  let mut app = app::App::new(&config, ctx);
  app.run().await?;

  Ok(())
}

//! Authentication session: demo/live mode and the bearer token.

mod store;

pub use store::SessionStore;

use thiserror::Error;
use tracing::{info, warn};

/// Fixed storage key for the bearer token.
pub const TOKEN_KEY: &str = "auth_token";

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("Session storage error: {0}")]
  Storage(#[from] rusqlite::Error),
  #[error("Failed to create session directory: {0}")]
  Io(#[from] std::io::Error),
  #[error("Could not determine data directory")]
  NoDataDir,
  #[error("Session store lock poisoned")]
  Poisoned,
}

/// What the data layer needs to know about the current session.
pub trait AuthProvider: Send + Sync {
  /// Whether screens should render bundled demo data instead of calling the backend.
  fn is_demo_mode(&self) -> bool;

  /// Bearer token to attach to backend requests, if any.
  fn token(&self) -> Option<String>;
}

/// Session backed by the local [`SessionStore`].
///
/// Without an explicit override, the session is in demo mode whenever no token
/// is stored. A missing store (e.g. no writable data directory) also means demo.
pub struct Session {
  store: Option<SessionStore>,
  demo_override: Option<bool>,
}

impl Session {
  pub fn new(store: Option<SessionStore>, demo_override: Option<bool>) -> Self {
    Self {
      store,
      demo_override,
    }
  }

  /// Persist a token for subsequent requests.
  pub fn login(&self, token: &str) -> Result<(), SessionError> {
    match &self.store {
      Some(store) => {
        store.set(TOKEN_KEY, token)?;
        info!("Stored session token");
        Ok(())
      }
      None => Err(SessionError::NoDataDir),
    }
  }

  /// Forget the stored token.
  pub fn logout(&self) -> Result<(), SessionError> {
    if let Some(store) = &self.store {
      store.remove(TOKEN_KEY)?;
      info!("Cleared session token");
    }
    Ok(())
  }
}

impl AuthProvider for Session {
  fn is_demo_mode(&self) -> bool {
    match self.demo_override {
      Some(demo) => demo,
      None => self.token().is_none(),
    }
  }

  fn token(&self) -> Option<String> {
    let store = self.store.as_ref()?;
    match store.get(TOKEN_KEY) {
      Ok(token) => token.filter(|t| !t.is_empty()),
      Err(e) => {
        warn!(error = %e, "Failed to read session token");
        None
      }
    }
  }
}

//! Key/value session storage backed by SQLite.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::SessionError;

/// Schema for the session table.
const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    stored_at TEXT NOT NULL
);
"#;

/// Client-local store that survives restarts (the terminal's localStorage).
pub struct SessionStore {
  conn: Mutex<Connection>,
}

impl SessionStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self, SessionError> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self, SessionError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// Store that lives only as long as the process.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self, SessionError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, SessionError> {
    conn.execute_batch(SESSION_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf, SessionError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(SessionError::NoDataDir)?;

    Ok(data_dir.join("secdash").join("session.db"))
  }

  pub fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
    let conn = self.conn.lock().map_err(|_| SessionError::Poisoned)?;
    let value = conn
      .query_row(
        "SELECT value FROM session WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  pub fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
    let conn = self.conn.lock().map_err(|_| SessionError::Poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO session (key, value, stored_at) VALUES (?, ?, ?)",
      params![key, value, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
  }

  pub fn remove(&self, key: &str) -> Result<(), SessionError> {
    let conn = self.conn.lock().map_err(|_| SessionError::Poisoned)?;
    conn.execute("DELETE FROM session WHERE key = ?", params![key])?;
    Ok(())
  }
}

//! Scalar key-value store backed by SQLite.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// A scalar value the store can hold.
///
/// Untagged on the wire, so values round-trip as plain JSON scalars
/// (`true`, `42`, `1.5`, `"text"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

impl Scalar {
  /// The contained string, if this is a text scalar.
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Scalar::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Scalar::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Scalar::Int(n) => Some(*n),
      _ => None,
    }
  }
}

impl From<bool> for Scalar {
  fn from(v: bool) -> Self {
    Scalar::Bool(v)
  }
}

impl From<i64> for Scalar {
  fn from(v: i64) -> Self {
    Scalar::Int(v)
  }
}

impl From<f64> for Scalar {
  fn from(v: f64) -> Self {
    Scalar::Float(v)
  }
}

impl From<String> for Scalar {
  fn from(v: String) -> Self {
    Scalar::Text(v)
  }
}

impl From<&str> for Scalar {
  fn from(v: &str) -> Self {
    Scalar::Text(v.to_string())
  }
}

/// Schema for the scalar table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Persisted scalar store.
///
/// Keys are namespaced with a fixed prefix so several subsystems can share
/// one database file without colliding.
pub struct KvStore {
  conn: Mutex<Connection>,
  prefix: String,
}

impl KvStore {
  /// Open (or create) the store at the given database path.
  pub fn open(path: &Path, namespace: &str) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
      prefix: namespace.to_string(),
    })
  }

  fn full_key(&self, key: &str) -> String {
    format!("{}_{}", self.prefix, key)
  }

  /// Read a scalar. Absence yields `Ok(None)`; a stored value that no longer
  /// parses is treated as absent rather than an error.
  pub fn read(&self, key: &str) -> Result<Option<Scalar>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let raw: Option<String> = conn
      .query_row(
        "SELECT value FROM meta WHERE key = ?",
        params![self.full_key(key)],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read key {}: {}", key, e))?;

    let Some(raw) = raw else {
      return Ok(None);
    };

    match serde_json::from_str(&raw) {
      Ok(value) => Ok(Some(value)),
      Err(e) => {
        tracing::warn!("Discarding unparseable value for key {}: {}", key, e);
        Ok(None)
      }
    }
  }

  /// Write a scalar, replacing any previous value.
  pub fn write(&self, key: &str, value: &Scalar) -> Result<()> {
    let raw =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to encode value: {}", e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        params![self.full_key(key), raw],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;

    Ok(())
  }

  /// Delete a key. Absence is not an error.
  pub fn delete(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM meta WHERE key = ?", params![self.full_key(key)])
      .map_err(|e| eyre!("Failed to delete key {}: {}", key, e))?;

    Ok(())
  }
}

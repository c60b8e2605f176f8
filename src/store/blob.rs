//! Directory-backed blob store for cached collection payloads.

use color_eyre::{eyre::eyre, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores one file per collection under a root directory, named
/// `<collection>.json`. Writes are atomic whole-file replacements
/// (write to a temp file, then rename over the target).
pub struct BlobStore {
  root: PathBuf,
}

/// Normalize a collection name into a safe filename stem.
///
/// Path separators and anything else outside `[A-Za-z0-9_-]` become
/// underscores, so a hostile name cannot escape the store directory.
pub fn sanitize(name: &str) -> String {
  let cleaned: String = name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();

  if cleaned.is_empty() {
    "_".to_string()
  } else {
    cleaned
  }
}

impl BlobStore {
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  fn file_path(&self, name: &str) -> PathBuf {
    self.root.join(format!("{}.json", sanitize(name)))
  }

  fn temp_path(&self, name: &str) -> PathBuf {
    self.root.join(format!(".{}.json.tmp", sanitize(name)))
  }

  /// Write the blob for a collection, replacing any existing one.
  /// Creates the root directory on first use.
  pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(&self.root)
      .map_err(|e| eyre!("Failed to create blob directory {}: {}", self.root.display(), e))?;

    let temp = self.temp_path(name);
    let path = self.file_path(name);

    std::fs::write(&temp, bytes)
      .map_err(|e| eyre!("Failed to write blob {}: {}", temp.display(), e))?;
    std::fs::rename(&temp, &path)
      .map_err(|e| eyre!("Failed to replace blob {}: {}", path.display(), e))?;

    tracing::debug!("Cached {} bytes to {}", bytes.len(), path.display());
    Ok(())
  }

  /// Read the blob for a collection. A missing file yields `Ok(None)`.
  pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
    let path = self.file_path(name);

    match std::fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(eyre!("Failed to read blob {}: {}", path.display(), e)),
    }
  }

  /// Delete the blob for a collection. Absence is not an error.
  pub fn delete(&self, name: &str) -> Result<()> {
    let path = self.file_path(name);

    match std::fs::remove_file(&path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!("Failed to delete blob {}: {}", path.display(), e)),
    }
  }

  #[cfg(test)]
  pub fn path_for(&self, name: &str) -> PathBuf {
    self.file_path(name)
  }
}

/// Default blob root derived from the platform data directory.
pub fn default_root(namespace: &str) -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join(namespace))
}

impl AsRef<Path> for BlobStore {
  fn as_ref(&self) -> &Path {
    &self.root
  }
}

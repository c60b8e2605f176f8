use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store;

/// Namespace for the on-disk footprint: the cache directory name and the
/// key prefix inside the scalar store.
pub const NAMESPACE: &str = "stockroom";

/// Default maximum cache age: 30 days.
const DEFAULT_MAXIMUM_CACHE_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Default throttle between asks for the remote update marker: 24 hours.
const DEFAULT_MARKER_CHECK_INTERVAL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Seconds before cached data is stale regardless of server assertions.
  pub maximum_cache_age_secs: i64,
  /// Minimum seconds between asking the remote for its update marker.
  pub marker_check_interval_secs: i64,
  /// When false, every staleness check reports stale and the cache is bypassed.
  pub caching_enabled: bool,
  /// When true, remote-fetch failures are also forwarded to the error reporter
  /// instead of only being logged locally.
  pub verbose_logging_enabled: bool,
  /// Where cached blobs and bookkeeping live.
  /// Defaults to `<platform data dir>/stockroom`.
  pub root_dir: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      maximum_cache_age_secs: DEFAULT_MAXIMUM_CACHE_AGE_SECS,
      marker_check_interval_secs: DEFAULT_MARKER_CHECK_INTERVAL_SECS,
      caching_enabled: true,
      verbose_logging_enabled: false,
      root_dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./stockroom.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/stockroom/config.yaml
  ///
  /// With no explicit path and no file found, defaults apply.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("stockroom.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(NAMESPACE).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The directory holding blobs and the bookkeeping database.
  pub fn resolve_root_dir(&self) -> Result<PathBuf> {
    match &self.root_dir {
      Some(dir) => Ok(dir.clone()),
      None => store::default_root(NAMESPACE),
    }
  }

  pub fn maximum_cache_age(&self) -> Duration {
    Duration::seconds(self.maximum_cache_age_secs)
  }

  pub fn marker_check_interval(&self) -> Duration {
    Duration::seconds(self.marker_check_interval_secs)
  }
}

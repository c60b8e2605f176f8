//! Staleness policy and cache primitives over the two persistence leaves.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;

use crate::config::{Config, NAMESPACE};
use crate::store::{sanitize, BlobStore, KvStore, Scalar};
use crate::Record;

use super::marker::{decode_timestamp, encode_timestamp, UpdateMarker};

/// Key under which the server-asserted update marker is stored.
const LATEST_UPDATE_KEY: &str = "latest_database_update";

/// Key under which the last marker-check time is stored.
const MARKER_CHECKED_KEY: &str = "update_marker_checked_at";

/// A server marker must beat the local write by more than this to count as
/// newer; sub-second clock skew between stamp and marker is not staleness.
const MARKER_EPSILON_SECS: i64 = 1;

/// Owns the staleness policy for cached collections.
///
/// A collection's payload lives in the blob store as `<name>.json`; the time
/// it was last persisted lives in the scalar store. [`CacheManager::fetch`]
/// only ever returns a payload whose staleness check passed; everything else
/// degrades to "no data" and the caller falls back to the remote source.
pub struct CacheManager {
  kv: KvStore,
  blobs: BlobStore,
  maximum_cache_age: Duration,
  marker_check_interval: Duration,
  caching_enabled: bool,
}

impl CacheManager {
  /// Open the cache under the configured root directory.
  pub fn open(config: &Config) -> Result<Self> {
    let root = config.resolve_root_dir()?;
    let kv = KvStore::open(&root.join("meta.db"), NAMESPACE)?;
    let blobs = BlobStore::new(root);

    Ok(Self {
      kv,
      blobs,
      maximum_cache_age: config.maximum_cache_age(),
      marker_check_interval: config.marker_check_interval(),
      caching_enabled: config.caching_enabled,
    })
  }

  // ==========================================================================
  // Scalar bookkeeping
  // ==========================================================================

  /// Read a bookkeeping scalar. Never fails; storage errors read as absent.
  pub fn get(&self, key: &str) -> Option<Scalar> {
    match self.kv.read(key) {
      Ok(value) => value,
      Err(e) => {
        tracing::warn!("Scalar read for {} failed: {}", key, e);
        None
      }
    }
  }

  /// Write a bookkeeping scalar.
  pub fn set(&self, key: &str, value: Scalar) -> Result<()> {
    self.kv.write(key, &value)
  }

  fn last_write_key(name: &str) -> String {
    format!("{}_last_write", sanitize(name))
  }

  fn last_write(&self, name: &str) -> Option<DateTime<Utc>> {
    self
      .get(&Self::last_write_key(name))
      .and_then(|s| s.as_text().and_then(decode_timestamp))
  }

  fn read_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
    self.get(key).and_then(|s| s.as_text().and_then(decode_timestamp))
  }

  // ==========================================================================
  // Staleness policy
  // ==========================================================================

  /// Whether the caller must go to the remote source for this collection.
  ///
  /// True when caching is disabled, the collection was never persisted, the
  /// local copy is older than the maximum cache age, or the server has
  /// asserted an update newer than the local copy.
  pub fn should_fetch(&self, name: &str) -> bool {
    if !self.caching_enabled {
      return true;
    }

    let Some(last_write) = self.last_write(name) else {
      // Never cached (or the stamp was lost): first use always fetches.
      return true;
    };

    if Utc::now() - last_write > self.maximum_cache_age {
      return true;
    }

    if let UpdateMarker::Set(asserted) = self.latest_database_update() {
      if (asserted - last_write).num_seconds() > MARKER_EPSILON_SECS {
        return true;
      }
    }

    false
  }

  // ==========================================================================
  // Payloads
  // ==========================================================================

  /// Persist a payload for a collection, then stamp its last-write time.
  ///
  /// The stamp only follows a successful blob write; on failure the previous
  /// stamp (if any) is left untouched and the error is returned.
  pub fn cache(&self, payload: &[Record], name: &str) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(payload)?;
    self.blobs.write(name, &bytes)?;
    self.set(
      &Self::last_write_key(name),
      Scalar::from(encode_timestamp(Utc::now())),
    )
  }

  /// Return the cached payload for a collection, or `None` when the caller
  /// should fetch instead.
  ///
  /// A missing file, unreadable file, or malformed payload all degrade to
  /// `None` rather than an error; the cache never blocks a live fetch.
  pub fn fetch(&self, name: &str) -> Option<Vec<Record>> {
    if self.should_fetch(name) {
      return None;
    }

    let bytes = match self.blobs.read(name) {
      Ok(Some(bytes)) => bytes,
      Ok(None) => return None,
      Err(e) => {
        tracing::warn!("Blob read for {} failed: {}", name, e);
        return None;
      }
    };

    match serde_json::from_slice(&bytes) {
      Ok(records) => Some(records),
      Err(e) => {
        tracing::warn!("Discarding malformed cached payload for {}: {}", name, e);
        None
      }
    }
  }

  /// Invalidate a collection: delete its blob and its last-write stamp.
  /// Idempotent; invalidating an absent collection is not an error.
  pub fn remove_file(&self, name: &str) -> Result<()> {
    self.blobs.delete(name)?;
    self.kv.delete(&Self::last_write_key(name))
  }

  // ==========================================================================
  // Server-asserted update marker
  // ==========================================================================

  pub fn latest_database_update(&self) -> UpdateMarker {
    self.read_timestamp(LATEST_UPDATE_KEY).into()
  }

  /// Record (or clear) the server-asserted update marker.
  pub fn set_latest_database_update(&self, marker: UpdateMarker) -> Result<()> {
    match marker.timestamp() {
      Some(t) => self.set(LATEST_UPDATE_KEY, Scalar::from(encode_timestamp(t))),
      None => self.kv.delete(LATEST_UPDATE_KEY),
    }
  }

  /// Whether enough time has passed to ask the remote for its update marker
  /// again. True on first use.
  pub fn marker_check_due(&self) -> bool {
    match self.read_timestamp(MARKER_CHECKED_KEY) {
      Some(checked) => Utc::now() - checked > self.marker_check_interval,
      None => true,
    }
  }

  /// Stamp the marker-check throttle with the current time.
  pub fn note_marker_checked(&self) -> Result<()> {
    self.set(
      MARKER_CHECKED_KEY,
      Scalar::from(encode_timestamp(Utc::now())),
    )
  }
}

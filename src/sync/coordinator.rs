//! Startup synchronization across a configured set of collections.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::config::Config;

use super::traits::{ErrorReporter, RemoteSource, SyncObserver};

/// Orchestrates one sync pass: cache-first per collection, remote on miss.
///
/// Per collection, exactly one observer callback fires per [`start`] call:
/// `on_fetched` with cached or freshly fetched records, or `on_error` when
/// the cache missed and the remote fetch failed. Fresh records are persisted
/// (or the persistence failure reported) before delivery, so a crash right
/// after delivery still leaves the cache warm for the next run.
///
/// [`start`]: SyncCoordinator::start
pub struct SyncCoordinator<R, E> {
  cache: Arc<CacheManager>,
  remote: R,
  reporter: E,
  verbose_logging: bool,
}

impl<R: RemoteSource, E: ErrorReporter> SyncCoordinator<R, E> {
  pub fn new(cache: Arc<CacheManager>, remote: R, reporter: E, config: &Config) -> Self {
    Self {
      cache,
      remote,
      reporter,
      verbose_logging: config.verbose_logging_enabled,
    }
  }

  /// Sync every named collection, delivering each result to the observer.
  ///
  /// Collections are independent and run concurrently; no ordering is
  /// guaranteed between them.
  pub async fn start<O: SyncObserver>(&self, collections: &[&str], observer: &O) {
    self.refresh_update_marker().await;

    let syncs = collections
      .iter()
      .map(|name| self.sync_collection(name, observer));
    futures::future::join_all(syncs).await;
  }

  /// Ask the remote when its data last changed, at most once per throttle
  /// window. The stored marker is what `should_fetch` compares against.
  async fn refresh_update_marker(&self) {
    if !self.cache.marker_check_due() {
      return;
    }

    match self.remote.fetch_update_marker().await {
      Ok(marker) => {
        if let Err(e) = self.cache.set_latest_database_update(marker.into()) {
          self.report_persistence(&format!("Failed to store update marker: {}", e));
        }
      }
      Err(e) => {
        self.report_remote(&format!("Update marker fetch failed: {}", e));
      }
    }

    // The throttle stamps the attempt, not the outcome; a flaky backend
    // should not turn the marker check into a per-start network call.
    if let Err(e) = self.cache.note_marker_checked() {
      self.report_persistence(&format!("Failed to stamp marker check: {}", e));
    }
  }

  async fn sync_collection<O: SyncObserver>(&self, name: &str, observer: &O) {
    if let Some(records) = self.cache.fetch(name) {
      tracing::debug!("Serving {} from cache ({} records)", name, records.len());
      observer.on_fetched(records, name);
      return;
    }

    match self.remote.fetch_all(name).await {
      Ok(records) => {
        if let Err(e) = self.cache.cache(&records, name) {
          self.report_persistence(&format!("Failed to cache {}: {}", name, e));
        }
        observer.on_fetched(records, name);
      }
      Err(e) => {
        self.report_remote(&format!("Remote fetch of {} failed: {}", name, e));
        observer.on_error(name, e);
      }
    }
  }

  /// Persistence failures always reach the reporter.
  fn report_persistence(&self, message: &str) {
    tracing::warn!("{}", message);
    self.reporter.report(message);
  }

  /// Remote failures reach the reporter only with verbose logging on;
  /// they are surfaced to the observer either way.
  fn report_remote(&self, message: &str) {
    tracing::warn!("{}", message);
    if self.verbose_logging {
      self.reporter.report(message);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Record;
  use chrono::{DateTime, Duration, Utc};
  use color_eyre::{eyre::eyre, Result};
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  fn record(value: serde_json::Value) -> Record {
    match value {
      serde_json::Value::Object(map) => map,
      _ => panic!("test records must be objects"),
    }
  }

  /// Canned remote backend counting how often it is asked.
  #[derive(Default)]
  struct FakeRemote {
    collections: HashMap<String, Vec<Record>>,
    failing: bool,
    marker: Option<DateTime<Utc>>,
    fetch_calls: AtomicUsize,
    marker_calls: AtomicUsize,
  }

  impl FakeRemote {
    fn with_collection(mut self, name: &str, records: Vec<Record>) -> Self {
      self.collections.insert(name.to_string(), records);
      self
    }

    fn fetches(&self) -> usize {
      self.fetch_calls.load(Ordering::SeqCst)
    }

    fn marker_fetches(&self) -> usize {
      self.marker_calls.load(Ordering::SeqCst)
    }
  }

  impl RemoteSource for &FakeRemote {
    async fn fetch_all(&self, collection: &str) -> Result<Vec<Record>> {
      self.fetch_calls.fetch_add(1, Ordering::SeqCst);
      if self.failing {
        return Err(eyre!("backend unavailable"));
      }
      Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    async fn fetch_update_marker(&self) -> Result<Option<DateTime<Utc>>> {
      self.marker_calls.fetch_add(1, Ordering::SeqCst);
      if self.failing {
        return Err(eyre!("backend unavailable"));
      }
      Ok(self.marker)
    }
  }

  /// Observer recording every callback.
  #[derive(Default)]
  struct RecordingObserver {
    fetched: Mutex<Vec<(String, Vec<Record>)>>,
    errors: Mutex<Vec<String>>,
  }

  impl SyncObserver for RecordingObserver {
    fn on_fetched(&self, records: Vec<Record>, collection: &str) {
      self
        .fetched
        .lock()
        .unwrap()
        .push((collection.to_string(), records));
    }

    fn on_error(&self, collection: &str, _error: color_eyre::Report) {
      self.errors.lock().unwrap().push(collection.to_string());
    }
  }

  #[derive(Default)]
  struct RecordingReporter {
    messages: Mutex<Vec<String>>,
  }

  impl ErrorReporter for &RecordingReporter {
    fn report(&self, message: &str) {
      self.messages.lock().unwrap().push(message.to_string());
    }
  }

  fn open_cache(tweak: impl FnOnce(&mut Config)) -> (tempfile::TempDir, Config, Arc<CacheManager>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config {
      root_dir: Some(dir.path().to_path_buf()),
      ..Config::default()
    };
    tweak(&mut config);
    let cache = Arc::new(CacheManager::open(&config).unwrap());
    (dir, config, cache)
  }

  #[tokio::test]
  async fn cold_start_fetches_and_warms_the_cache() {
    let (_dir, config, cache) = open_cache(|_| {});
    let remote =
      FakeRemote::default().with_collection("race", vec![record(json!({"name": "elf"}))]);
    let reporter = RecordingReporter::default();
    let observer = RecordingObserver::default();

    let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
    coordinator.start(&["race"], &observer).await;

    let fetched = observer.fetched.lock().unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].0, "race");
    assert_eq!(fetched[0].1[0]["name"], json!("elf"));
    assert!(observer.errors.lock().unwrap().is_empty());

    // Delivery happened after the cache write.
    assert_eq!(cache.fetch("race").unwrap()[0]["name"], json!("elf"));
  }

  #[tokio::test]
  async fn warm_start_serves_cache_without_touching_the_remote() {
    let (_dir, config, cache) = open_cache(|_| {});
    cache
      .cache(&[record(json!({"name": "dwarf"}))], "race")
      .unwrap();
    cache.note_marker_checked().unwrap();

    let remote = FakeRemote::default();
    let reporter = RecordingReporter::default();
    let observer = RecordingObserver::default();

    let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
    coordinator.start(&["race"], &observer).await;

    assert_eq!(remote.fetches(), 0);
    assert_eq!(remote.marker_fetches(), 0);

    let fetched = observer.fetched.lock().unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].1[0]["name"], json!("dwarf"));
  }

  #[tokio::test]
  async fn remote_failure_reaches_on_error_exactly_once() {
    let (_dir, config, cache) = open_cache(|_| {});
    let remote = FakeRemote {
      failing: true,
      ..FakeRemote::default()
    };
    let reporter = RecordingReporter::default();
    let observer = RecordingObserver::default();

    let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
    coordinator.start(&["action"], &observer).await;

    assert!(observer.fetched.lock().unwrap().is_empty());
    assert_eq!(*observer.errors.lock().unwrap(), vec!["action".to_string()]);
  }

  #[tokio::test]
  async fn remote_failures_reported_only_with_verbose_logging() {
    for verbose in [false, true] {
      let (_dir, config, cache) = open_cache(|c| c.verbose_logging_enabled = verbose);
      let remote = FakeRemote {
        failing: true,
        ..FakeRemote::default()
      };
      let reporter = RecordingReporter::default();
      let observer = RecordingObserver::default();

      let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
      coordinator.start(&["action"], &observer).await;

      assert_eq!(!reporter.messages.lock().unwrap().is_empty(), verbose);
    }
  }

  #[tokio::test]
  async fn every_collection_gets_exactly_one_callback() {
    let (_dir, config, cache) = open_cache(|_| {});
    let remote = FakeRemote::default()
      .with_collection("race", vec![record(json!({"id": 1}))])
      .with_collection("weapon", vec![]);
    let reporter = RecordingReporter::default();
    let observer = RecordingObserver::default();

    let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
    coordinator
      .start(&["race", "weapon", "armor"], &observer)
      .await;

    let fetched = observer.fetched.lock().unwrap();
    let errors = observer.errors.lock().unwrap();
    assert_eq!(fetched.len() + errors.len(), 3);

    let mut names: Vec<&str> = fetched.iter().map(|(n, _)| n.as_str()).collect();
    names.extend(errors.iter().map(String::as_str));
    names.sort_unstable();
    assert_eq!(names, vec!["armor", "race", "weapon"]);
  }

  #[tokio::test]
  async fn marker_check_is_throttled_across_starts() {
    let (_dir, config, cache) = open_cache(|_| {});
    let remote = FakeRemote::default();
    let reporter = RecordingReporter::default();
    let observer = RecordingObserver::default();

    let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
    coordinator.start(&[], &observer).await;
    coordinator.start(&[], &observer).await;

    assert_eq!(remote.marker_fetches(), 1);
  }

  #[tokio::test]
  async fn newer_server_marker_forces_a_refetch_of_fresh_cache() {
    let (_dir, config, cache) = open_cache(|_| {});
    cache
      .cache(&[record(json!({"rev": "old"}))], "detail")
      .unwrap();

    // The backend asserts an update well after our local write, and the
    // throttle window has elapsed (never checked), so the sync must go remote.
    let remote = FakeRemote {
      marker: Some(Utc::now() + Duration::hours(1)),
      ..FakeRemote::default()
    }
    .with_collection("detail", vec![record(json!({"rev": "new"}))]);
    let reporter = RecordingReporter::default();
    let observer = RecordingObserver::default();

    let coordinator = SyncCoordinator::new(Arc::clone(&cache), &remote, &reporter, &config);
    coordinator.start(&["detail"], &observer).await;

    assert_eq!(remote.fetches(), 1);
    let fetched = observer.fetched.lock().unwrap();
    assert_eq!(fetched[0].1[0]["rev"], json!("new"));
  }
}

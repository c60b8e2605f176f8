//! Collaborator seams for the sync layer.
//!
//! The remote backend, the error sink, and the receiving side of a sync are
//! all trait objects supplied by the embedding application; the core never
//! talks to a network or a crash reporter directly.

use chrono::{DateTime, Utc};
use color_eyre::{Report, Result};

use crate::Record;

/// The remote backend the cache fronts.
pub trait RemoteSource {
  /// Fetch every record in a collection.
  fn fetch_all(
    &self,
    collection: &str,
  ) -> impl std::future::Future<Output = Result<Vec<Record>>>;

  /// Ask the backend when its data last changed, if it tracks that at all.
  fn fetch_update_marker(
    &self,
  ) -> impl std::future::Future<Output = Result<Option<DateTime<Utc>>>>;
}

/// Receives the outcome of a sync, one callback per collection.
pub trait SyncObserver {
  fn on_fetched(&self, records: Vec<Record>, collection: &str);
  fn on_error(&self, collection: &str, error: Report);
}

/// Fire-and-forget error sink (e.g. a hosted crash reporter).
/// Implementations must not panic back into the core.
pub trait ErrorReporter {
  fn report(&self, message: &str);
}

/// Default reporter: errors stay in the local log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
  fn report(&self, message: &str) {
    tracing::warn!("{}", message);
  }
}

//! stockroom - a local cache with staleness detection for named remote
//! collections.
//!
//! The cache persists each collection as a JSON blob and decides, per
//! collection, whether the local copy can be served or the caller must go
//! back to the remote backend. The decision survives restarts, manual
//! invalidation, and server-asserted update markers.
//!
//! The remote backend itself is out of scope: it appears only as the
//! [`RemoteSource`] collaborator trait, alongside [`SyncObserver`] for
//! delivery and [`ErrorReporter`] for fire-and-forget error reporting.

mod cache;
mod config;
mod store;
mod sync;

pub use cache::{CacheManager, UpdateMarker};
pub use config::Config;
pub use store::Scalar;
pub use sync::{ErrorReporter, LogReporter, RemoteSource, SyncCoordinator, SyncObserver};

/// One cached record: a JSON object. Payloads are ordered sequences of these,
/// persisted as a single top-level JSON array per collection.
pub type Record = serde_json::Map<String, serde_json::Value>;

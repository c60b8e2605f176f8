//! Sync orchestration between the local cache and the remote backend.

mod coordinator;
mod traits;

pub use coordinator::SyncCoordinator;
pub use traits::{ErrorReporter, LogReporter, RemoteSource, SyncObserver};

//! Persistence leaves: a scalar key-value store and a JSON blob store.
//!
//! Both stores are deliberately thin. All policy (staleness, invalidation,
//! what the stored values mean) lives in the cache layer above them.

mod blob;
mod kv;

pub use blob::{default_root, sanitize, BlobStore};
pub use kv::{KvStore, Scalar};

//! Local collection cache with staleness detection.
//!
//! This module decides whether a persisted local copy of a remote collection
//! is still trustworthy:
//! - Payloads live as one JSON blob per collection
//! - A last-write stamp per collection drives a TTL check
//! - An optional server-asserted update marker can override the TTL and force
//!   a re-fetch when the backend reports newer data

mod manager;
mod marker;

pub use manager::CacheManager;
pub use marker::UpdateMarker;

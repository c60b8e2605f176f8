//! Server-asserted update marker.

use chrono::{DateTime, Utc};

/// The most recent "database last updated" time the remote backend has
/// asserted, if it has asserted one at all.
///
/// An explicit two-state type rather than an `Option` so that "no marker
/// stored" is never confused with a real timestamp by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMarker {
  /// The remote has never asserted an update time (or the marker was cleared).
  #[default]
  Unset,
  /// The remote last changed its data at this time.
  Set(DateTime<Utc>),
}

impl UpdateMarker {
  pub fn timestamp(&self) -> Option<DateTime<Utc>> {
    match self {
      UpdateMarker::Unset => None,
      UpdateMarker::Set(t) => Some(*t),
    }
  }
}

impl From<Option<DateTime<Utc>>> for UpdateMarker {
  fn from(value: Option<DateTime<Utc>>) -> Self {
    match value {
      Some(t) => UpdateMarker::Set(t),
      None => UpdateMarker::Unset,
    }
  }
}

/// Encode a timestamp for scalar storage.
pub fn encode_timestamp(t: DateTime<Utc>) -> String {
  t.to_rfc3339()
}

/// Decode a stored timestamp. Unparseable text yields `None`, which callers
/// treat the same as "never recorded".
pub fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw)
    .map(|t| t.with_timezone(&Utc))
    .ok()
}

//! Bucketed trend extraction for numeric predicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One trend bucket: the value open at the bucket's end.
///
/// Facts are state, not samples — the representative is last-known, never an
/// average over the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Start of the bucket.
    pub bucket_start: DateTime<Utc>,

    /// Numeric value open at the bucket end.
    pub value: f64,
}

//! Fact versions — the temporal instances of a triple.
//!
//! A triple identity names *what* is being asserted; a [`FactVersion`] is
//! one temporally-bounded assertion of it. Versions of an identity form a
//! strictly ordered, non-overlapping chain linked by back-references only —
//! the store's arena owns every version, a version never owns another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceComponents;
use crate::interval::Interval;
use crate::provenance::Provenance;
use crate::triple::{TripleId, TripleKey, VersionId};
use crate::value::Value;

/// One temporally-bounded value assigned to a triple identity.
///
/// Sealed versions are immutable except for the two fields supersession is
/// defined to touch: the interval's `until` and the `superseded_by`
/// back-reference. Value and provenance are never overwritten, which is what
/// makes history auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactVersion {
    /// Unique id of this version.
    pub id: VersionId,

    /// The full triple key (subject, predicate, object shape).
    pub key: TripleKey,

    /// Cached content hash of `key`.
    pub triple: TripleId,

    /// Value payload.
    pub value: Value,

    /// Validity interval `[from, until)`; open `until` means current.
    pub validity: Interval,

    /// Transaction time: when the engine recorded this version.
    pub recorded_at: DateTime<Utc>,

    /// Where the assertion came from.
    pub provenance: Provenance,

    /// Stored confidence signals; the composite is recomputable from these.
    pub components: ConfidenceComponents,

    /// Composite confidence at write time. A snapshot, not a contract —
    /// recompute with [`crate::ConfidenceModel::score`] for a current value.
    pub confidence: f32,

    /// Back-reference to the version this one superseded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<VersionId>,

    /// Back-reference to the version that superseded this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<VersionId>,
}

impl FactVersion {
    /// Returns true while the validity interval is open-ended.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.validity.until.is_none()
    }

    /// Returns true if the version's interval contains `at`.
    #[must_use]
    pub fn is_live_at(&self, at: DateTime<Utc>) -> bool {
        self.validity.contains(at)
    }

    /// Returns true once a successor exists.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}

/// The scored payload handed to the store by the ingestion path.
///
/// The Confidence Engine scores candidates *before* the store versions them;
/// the draft carries the outcome of that scoring so the store stays a pure
/// versioning layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDraft {
    /// Value payload.
    pub value: Value,
    /// Provenance of the assertion.
    pub provenance: Provenance,
    /// Confidence signals derived at ingest.
    pub components: ConfidenceComponents,
    /// Composite score at ingest.
    pub confidence: f32,
}

impl FactDraft {
    /// Creates a draft.
    #[must_use]
    pub const fn new(
        value: Value,
        provenance: Provenance,
        components: ConfidenceComponents,
        confidence: f32,
    ) -> Self {
        Self {
            value,
            provenance,
            components,
            confidence,
        }
    }
}

//! Conflict flags for surfaced contradictions.
//!
//! When an accepted fact contradicts a high-confidence incumbent, the engine
//! does not pick a winner. The new version stores with a scoring discount and
//! a [`ConflictFlag`] is recorded for caller review. Flags are explicit
//! objects with a lifecycle, never hidden errors.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::triple::{TripleId, VersionId};
use crate::value::Value;

/// Unique identifier for a conflict flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Creates a new random conflict ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review status of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    /// Awaiting review.
    Open,
    /// A reviewer looked and kept both versions' history as-is.
    Reviewed,
    /// Deemed not a real contradiction.
    Dismissed,
}

impl Default for FlagStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Reviewed => write!(f, "reviewed"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// A stored fact that contradicts prior high-confidence data.
///
/// Carries both sides and the reliability figures the discount decision was
/// based on, so review needs no further lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictFlag {
    /// Flag id.
    pub id: ConflictId,

    /// The contested triple identity.
    pub triple: TripleId,

    /// The high-confidence version that was contradicted.
    pub incumbent: VersionId,

    /// The incumbent's value at detection time.
    pub incumbent_value: Value,

    /// The incumbent's recomputed confidence at detection time.
    pub incumbent_confidence: f32,

    /// The newly stored, discounted version.
    pub challenger: VersionId,

    /// The challenger's value.
    pub challenger_value: Value,

    /// Source reliability on each side at detection time.
    pub incumbent_reliability: f32,
    pub challenger_reliability: f32,

    /// When the contradiction was detected.
    pub detected_at: DateTime<Utc>,

    /// Review status.
    pub status: FlagStatus,
}

impl ConflictFlag {
    /// Returns true while the flag awaits review.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == FlagStatus::Open
    }
}

/// In-memory ledger of conflict flags, indexed by triple identity.
#[derive(Debug, Default)]
pub struct ConflictLedger {
    state: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    flags: Vec<ConflictFlag>,
    by_id: HashMap<ConflictId, usize>,
    by_triple: HashMap<TripleId, Vec<usize>>,
}

impl ConflictLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a flag.
    pub fn record(&self, flag: ConflictFlag) {
        let mut state = self.state.write().expect("conflict ledger lock poisoned");
        let idx = state.flags.len();
        state.by_id.insert(flag.id, idx);
        state.by_triple.entry(flag.triple).or_default().push(idx);
        state.flags.push(flag);
    }

    /// Returns a flag by id.
    #[must_use]
    pub fn get(&self, id: ConflictId) -> Option<ConflictFlag> {
        let state = self.state.read().expect("conflict ledger lock poisoned");
        state.by_id.get(&id).map(|&idx| state.flags[idx].clone())
    }

    /// All flags on a triple identity, oldest first.
    #[must_use]
    pub fn for_triple(&self, triple: TripleId) -> Vec<ConflictFlag> {
        let state = self.state.read().expect("conflict ledger lock poisoned");
        state
            .by_triple
            .get(&triple)
            .map(|indices| indices.iter().map(|&idx| state.flags[idx].clone()).collect())
            .unwrap_or_default()
    }

    /// All flags still awaiting review, oldest first.
    #[must_use]
    pub fn open_flags(&self) -> Vec<ConflictFlag> {
        let state = self.state.read().expect("conflict ledger lock poisoned");
        state
            .flags
            .iter()
            .filter(|flag| flag.is_open())
            .cloned()
            .collect()
    }

    /// Updates a flag's review status. Returns false if the id is unknown.
    pub fn set_status(&self, id: ConflictId, status: FlagStatus) -> bool {
        let mut state = self.state.write().expect("conflict ledger lock poisoned");
        match state.by_id.get(&id).copied() {
            Some(idx) => {
                state.flags[idx].status = status;
                true
            }
            None => false,
        }
    }

    /// Number of flags recorded (any status).
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .expect("conflict ledger lock poisoned")
            .flags
            .len()
    }

    /// Returns true if no flags have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

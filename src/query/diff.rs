//! Change detection between snapshots.

use serde::{Deserialize, Serialize};

use crate::triple::{TripleId, TripleKey};
use crate::value::Value;

/// What happened to one triple identity between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present at the later time only.
    Added,
    /// Present at both times with semantically different values.
    Modified,
    /// Present at the earlier time only (superseded chains show as
    /// `Modified`; expiry and gaps show as `Removed`).
    Removed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// One changed triple identity.
///
/// `before`/`after` are the values live at each endpoint; absence means the
/// identity had no live version at that instant. Comparison is by triple
/// identity and semantic value equality, never by value formatting — an
/// integer 100 and a float 100.0 are the same value, while a value against
/// its retraction is `Removed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The changed identity.
    pub triple: TripleId,

    /// The full triple key, for readability downstream.
    pub key: TripleKey,

    /// Value live at the earlier endpoint, if any.
    pub before: Option<Value>,

    /// Value live at the later endpoint, if any.
    pub after: Option<Value>,

    /// Classification.
    pub kind: ChangeKind,
}

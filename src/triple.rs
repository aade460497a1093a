//! Triple identity — the time-independent key of a fact.
//!
//! A triple is (subject, predicate, object shape). The object shape records
//! whether the fact carries a literal payload or is an edge to another
//! entity; for edges the target entity is part of the identity, so one
//! predicate can hold many concurrent edges but only one literal value.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityId;

/// The object half of a triple identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "shape", content = "target", rename_all = "snake_case")]
pub enum ObjectShape {
    /// The fact's payload is a literal value; identity is (subject, predicate).
    Literal,
    /// The fact is an edge to another entity; the target is part of identity.
    Entity(EntityId),
}

/// Time-independent identity of a fact: subject, predicate, object shape.
///
/// # Examples
///
/// ```
/// use twingraph::{EntityId, TripleKey};
///
/// let loan = EntityId::from_name("loanA");
/// let key = TripleKey::literal(loan, "creditScore");
/// assert_eq!(key.identity(), TripleKey::literal(loan, "creditScore").identity());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripleKey {
    /// Subject entity.
    pub subject: EntityId,
    /// Predicate name.
    pub predicate: String,
    /// Object shape.
    pub object: ObjectShape,
}

impl TripleKey {
    /// A literal-valued triple: (subject, predicate).
    #[must_use]
    pub fn literal(subject: EntityId, predicate: impl Into<String>) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object: ObjectShape::Literal,
        }
    }

    /// An edge triple: (subject, predicate, target entity).
    #[must_use]
    pub fn edge(subject: EntityId, predicate: impl Into<String>, target: EntityId) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object: ObjectShape::Entity(target),
        }
    }

    /// The entity on the object side, if this is an edge.
    #[must_use]
    pub const fn object_entity(&self) -> Option<EntityId> {
        match self.object {
            ObjectShape::Entity(id) => Some(id),
            ObjectShape::Literal => None,
        }
    }

    /// Stable content hash of this identity.
    ///
    /// Deterministic across processes and runs, so it serves as the index
    /// key everywhere version chains are addressed.
    #[must_use]
    pub fn identity(&self) -> TripleId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.subject.as_uuid().as_bytes());
        hasher.update(&[0x1f]); // field separator
        hasher.update(self.predicate.as_bytes());
        hasher.update(&[0x1f]);
        match self.object {
            ObjectShape::Literal => {
                hasher.update(&[0x00]);
            }
            ObjectShape::Entity(target) => {
                hasher.update(&[0x01]);
                hasher.update(target.as_uuid().as_bytes());
            }
        }
        TripleId(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for TripleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object {
            ObjectShape::Literal => write!(f, "({}, {})", self.subject, self.predicate),
            ObjectShape::Entity(target) => {
                write!(f, "({}, {}, {})", self.subject, self.predicate, target)
            }
        }
    }
}

/// Stable content hash identifying a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripleId([u8; 32]);

impl TripleId {
    /// Returns the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TripleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short hex prefix is enough to correlate log lines.
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Unique identifier of one fact version within a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Creates a new random version ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a version ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Entity identity for twin subjects.
//!
//! Entities are the stable anchors of a digital twin: every fact references
//! at least one. An entity is created the first time a fact mentions it and
//! is never physically deleted — its facts may expire, but identity persists.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic (v5) entity and source ids.
const TWIN_NAMESPACE: Uuid = Uuid::from_u128(0x6f21_9f5c_83a1_44d0_9e4b_27c6_51b8_02ad);

/// Globally unique, stable entity identifier.
///
/// Once created, an `EntityId` never changes. Ids derived from a canonical
/// name via [`EntityId::from_name`] are deterministic, so two ingestion
/// paths naming the same subject converge on the same twin.
///
/// # Examples
///
/// ```
/// use twingraph::EntityId;
///
/// let a = EntityId::from_name("loanA");
/// let b = EntityId::from_name("loanA");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a deterministic entity ID from a canonical name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&TWIN_NAMESPACE, name.as_bytes()))
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Classification of twin subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A human person.
    Person,
    /// A company, institution, or group.
    Organization,
    /// A physical or financial asset.
    Asset,
    /// A temporal event.
    Event,
    /// An abstract concept (industry, market segment, outcome).
    Concept,
    /// A custom kind.
    Custom(String),
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Organization => write!(f, "organization"),
            Self::Asset => write!(f, "asset"),
            Self::Event => write!(f, "event"),
            Self::Concept => write!(f, "concept"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// A twin subject.
///
/// Facts attach to entities via [`EntityId`]. The record itself is thin:
/// identity, a canonical name, a kind tag, and when the engine first saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identifier.
    pub id: EntityId,

    /// Canonical name the id was derived from (or assigned to).
    pub name: String,

    /// Kind tag.
    pub kind: EntityKind,

    /// When the engine first saw a fact referencing this entity.
    pub first_seen: DateTime<Utc>,
}

impl Entity {
    /// Creates an entity with a deterministic id derived from `name`.
    #[must_use]
    pub fn named(name: impl Into<String>, kind: EntityKind, first_seen: DateTime<Utc>) -> Self {
        let name = name.into();
        Self {
            id: EntityId::from_name(&name),
            name,
            kind,
            first_seen,
        }
    }
}

/// Derives a deterministic id in the shared twin namespace.
///
/// Kept here so entity and source identity share one namespace constant.
pub(crate) fn deterministic_id(name: &str) -> Uuid {
    Uuid::new_v5(&TWIN_NAMESPACE, name.as_bytes())
}

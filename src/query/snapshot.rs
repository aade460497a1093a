//! Point-in-time subgraph assembly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::fact::FactVersion;
use crate::triple::TripleId;

/// The induced subgraph of one entity at one instant.
///
/// Contains every fact version live at `at` whose triple has the entity as
/// subject or object (plus, for [`crate::QueryLayer::neighborhood`], the
/// expansion entities). Facts are keyed by triple identity in stable order,
/// so iteration — and everything derived from it — is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The entity the snapshot was rooted at.
    pub entity: EntityId,

    /// The instant the subgraph was assembled for.
    pub at: DateTime<Utc>,

    /// Live fact versions by triple identity.
    pub facts: BTreeMap<TripleId, FactVersion>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn empty(entity: EntityId, at: DateTime<Utc>) -> Self {
        Self {
            entity,
            at,
            facts: BTreeMap::new(),
        }
    }

    /// Number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if no fact was live at the snapshot instant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Looks up a fact by triple identity.
    #[must_use]
    pub fn fact(&self, triple: TripleId) -> Option<&FactVersion> {
        self.facts.get(&triple)
    }

    /// All facts carrying the given predicate, in stable order.
    pub fn facts_for_predicate<'a>(
        &'a self,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a FactVersion> {
        self.facts
            .values()
            .filter(move |fact| fact.key.predicate == predicate)
    }

    /// The strongest confidence among facts for a predicate, if any.
    #[must_use]
    pub fn best_confidence_for(&self, predicate: &str) -> Option<f32> {
        self.facts_for_predicate(predicate)
            .map(|fact| fact.confidence)
            .reduce(f32::max)
    }
}

//! Value payloads for fact versions.
//!
//! A fact version carries one value: a primitive, an entity reference, or
//! structured JSON. Numeric values compare *semantically* — an integer 100
//! equals a float 100.0 — so a re-extracted fact with a different numeric
//! representation is corroboration, not a change.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Possible payloads of a fact version.
///
/// # Examples
///
/// ```
/// use twingraph::Value;
///
/// assert!(Value::Int(100).semantically_eq(&Value::Float(100.0)));
/// assert!(!Value::Int(100).semantically_eq(&Value::Int(101)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Entity(EntityId),
    Structured(serde_json::Value),
    Null,
}

impl Value {
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view: integers widen to floats.
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Entity(_) => "entity",
            Self::Structured(_) => "structured",
            Self::Null => "null",
        }
    }

    /// Semantic equality: numeric values compare by magnitude across the
    /// int/float divide; everything else compares structurally.
    ///
    /// This is the comparison the diff and corroboration paths use, so a
    /// value of `100` and a value of `100.0` never register as a change.
    #[must_use]
    pub fn semantically_eq(&self, other: &Self) -> bool {
        match (self.as_float(), other.as_float()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Canonical hashable form used for histograms and corroboration sets.
    #[must_use]
    pub fn semantic_key(&self) -> ValueKey {
        match self {
            Self::Bool(v) => ValueKey::Bool(*v),
            Self::Int(v) => ValueKey::Num((*v as f64).to_bits()),
            Self::Float(v) => ValueKey::Num(v.to_bits()),
            Self::String(v) => ValueKey::String(v.clone()),
            Self::Entity(v) => ValueKey::Entity(*v),
            Self::Structured(v) => ValueKey::Structured(v.to_string()),
            Self::Null => ValueKey::Null,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Entity(v) => write!(f, "entity:{v}"),
            Self::Structured(v) => write!(f, "{v}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// Canonical, hashable identity of a value under semantic equality.
///
/// `Int(100)` and `Float(100.0)` map to the same key. Floats are keyed by
/// bit pattern after int widening, which is exact for every value the
/// numeric comparison treats as equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKey {
    Bool(bool),
    /// Bit pattern of the f64 magnitude.
    Num(u64),
    String(String),
    Entity(EntityId),
    /// Canonical JSON text.
    Structured(String),
    Null,
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self {
        Self::Entity(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}

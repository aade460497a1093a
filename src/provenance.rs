//! Provenance and source reliability.
//!
//! Every fact version records where it came from: a source identifier, the
//! extraction method that produced it, and the extractor's own confidence.
//! Reliability ratings live in a separate registry so re-rating a source
//! never mutates stored facts — scores are recomputed from components.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::deterministic_id;
use crate::error::ValidationError;

/// Stable identifier of a fact source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Derives a deterministic source ID from a source name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(deterministic_id(name))
    }

    /// Creates a new random source ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a candidate fact was produced upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Structured feed — the value arrived already typed.
    Structured,

    /// A deterministic parser produced the value.
    Parsed {
        parser: String,
    },

    /// A language model extracted the value from unstructured text.
    LanguageModel {
        model: String,
    },

    /// A human entered the value.
    Manual,

    Unknown,
}

impl Default for ExtractionMethod {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Parsed { parser } => write!(f, "parsed({parser})"),
            Self::LanguageModel { model } => write!(f, "language_model({model})"),
            Self::Manual => write!(f, "manual"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Provenance of one fact version.
///
/// # Examples
///
/// ```
/// use twingraph::Provenance;
///
/// let prov = Provenance::structured("bureau-feed", 0.98).unwrap();
/// assert_eq!(prov.extraction_confidence, 0.98);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Which source asserted the fact.
    pub source: SourceId,

    /// How the value was extracted.
    pub method: ExtractionMethod,

    /// The extractor's own confidence in the value, in [0, 1].
    pub extraction_confidence: f32,
}

impl Provenance {
    /// Creates provenance with validation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfidenceOutOfRange` if
    /// `extraction_confidence` is not in [0.0, 1.0].
    pub fn new(
        source: SourceId,
        method: ExtractionMethod,
        extraction_confidence: f32,
    ) -> Result<Self, ValidationError> {
        if extraction_confidence.is_nan() || !(0.0..=1.0).contains(&extraction_confidence) {
            return Err(ValidationError::ConfidenceOutOfRange {
                value: extraction_confidence,
            });
        }
        Ok(Self {
            source,
            method,
            extraction_confidence,
        })
    }

    /// Provenance from a structured feed, source named by string.
    pub fn structured(
        source_name: &str,
        extraction_confidence: f32,
    ) -> Result<Self, ValidationError> {
        Self::new(
            SourceId::from_name(source_name),
            ExtractionMethod::Structured,
            extraction_confidence,
        )
    }

    /// Provenance from a language-model extraction.
    pub fn language_model(
        source_name: &str,
        model: impl Into<String>,
        extraction_confidence: f32,
    ) -> Result<Self, ValidationError> {
        Self::new(
            SourceId::from_name(source_name),
            ExtractionMethod::LanguageModel {
                model: model.into(),
            },
            extraction_confidence,
        )
    }

    /// Provenance from manual entry.
    pub fn manual(source_name: &str, extraction_confidence: f32) -> Result<Self, ValidationError> {
        Self::new(
            SourceId::from_name(source_name),
            ExtractionMethod::Manual,
            extraction_confidence,
        )
    }
}

/// Runtime-adjustable reliability ratings per source.
///
/// A reliability weight (0.0–1.0) scales how much a source's assertions count
/// toward fact confidence without mutating stored versions. Unrated sources
/// get the configured default.
#[derive(Debug)]
pub struct SourceRegistry {
    ratings: RwLock<HashMap<SourceId, f32>>,
    default_reliability: f32,
}

impl SourceRegistry {
    /// Creates a registry with the given default reliability for unrated
    /// sources.
    #[must_use]
    pub fn new(default_reliability: f32) -> Self {
        Self {
            ratings: RwLock::new(HashMap::new()),
            default_reliability: default_reliability.clamp(0.0, 1.0),
        }
    }

    /// Sets (or replaces) a source's reliability rating, clamped to [0, 1].
    pub fn rate(&self, source: SourceId, reliability: f32) {
        let mut guard = self.ratings.write().expect("source registry lock poisoned");
        guard.insert(source, reliability.clamp(0.0, 1.0));
    }

    /// Current reliability for a source.
    #[must_use]
    pub fn reliability(&self, source: SourceId) -> f32 {
        let guard = self.ratings.read().expect("source registry lock poisoned");
        guard.get(&source).copied().unwrap_or(self.default_reliability)
    }

    /// The default applied to unrated sources.
    #[must_use]
    pub const fn default_reliability(&self) -> f32 {
        self.default_reliability
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(0.5)
    }
}

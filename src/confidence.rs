//! Composite confidence scoring.
//!
//! Confidence is never a bare number written once at ingest. Each fact
//! version stores its [`ConfidenceComponents`]; the composite score is a
//! pure function of those components, the predicate, and `now`, so it can
//! be recomputed at any time — when a source is re-rated, or simply because
//! temporal relevance decays — without touching history.
//!
//! The signals:
//! - source reliability (from the [`crate::SourceRegistry`])
//! - extraction confidence (the extractor's own estimate)
//! - temporal relevance (half-life decay, calibrated per predicate class)
//! - corroboration (sub-linear in the count of independent sources)
//! - logical consistency (a fixed discount when the value contradicts a
//!   high-confidence incumbent without superseding provenance)

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-version confidence signals, stored so the composite is explainable
/// and recomputable.
///
/// Temporal relevance is deliberately absent: it is a function of `now` and
/// is recomputed on every scoring call rather than frozen at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceComponents {
    /// Reliability rating of the asserting source at score time, in [0, 1].
    pub source_reliability: f32,

    /// The extractor's own confidence in the value, in [0, 1].
    pub extraction_confidence: f32,

    /// Number of independent sources asserting this value within the same
    /// validity window, including the asserting source. Never zero.
    pub corroborating_sources: u32,

    /// Set when the value contradicted a high-confidence incumbent without
    /// superseding provenance. Costs a fixed discount.
    pub contradicts_incumbent: bool,
}

impl ConfidenceComponents {
    /// Components for a fresh, uncorroborated, unconflicted assertion.
    #[must_use]
    pub const fn solo(source_reliability: f32, extraction_confidence: f32) -> Self {
        Self {
            source_reliability,
            extraction_confidence,
            corroborating_sources: 1,
            contradicts_incumbent: false,
        }
    }
}

/// Relative weights of the composite's signals.
///
/// Weights are normalized by their sum at score time, so any positive
/// combination is valid configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub source_reliability: f32,
    pub extraction_confidence: f32,
    pub temporal_relevance: f32,
    pub corroboration: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            source_reliability: 0.30,
            extraction_confidence: 0.30,
            temporal_relevance: 0.25,
            corroboration: 0.15,
        }
    }
}

/// One predicate class with its decay half-life.
#[derive(Debug, Clone)]
pub struct DecayClass {
    /// Name for logs and explanations.
    pub name: String,
    /// Predicates matching this pattern belong to the class.
    pub pattern: Regex,
    /// Half-life of temporal relevance for the class.
    pub half_life: Duration,
}

/// Half-life decay calibration per predicate class.
///
/// Temporal relevance is `0.5^(age / half_life)` where age is
/// `now − valid_from`. Facts about legal structure decay over years; facts
/// about market prices decay over weeks. The first matching class wins;
/// unmatched predicates use the default half-life. The curve and every
/// constant here are configuration, not behavior baked into the scorer.
#[derive(Debug, Clone)]
pub struct DecayPolicy {
    /// Ordered classes; first match wins.
    pub classes: Vec<DecayClass>,
    /// Half-life for predicates matching no class.
    pub default_half_life: Duration,
}

impl DecayPolicy {
    /// Half-life for a predicate.
    #[must_use]
    pub fn half_life(&self, predicate: &str) -> Duration {
        self.classes
            .iter()
            .find(|class| class.pattern.is_match(predicate))
            .map_or(self.default_half_life, |class| class.half_life)
    }

    /// Temporal relevance of a fact asserted at `valid_from`, seen at `now`.
    ///
    /// Monotonically non-increasing in `now`; 1.0 at or before `valid_from`.
    #[must_use]
    pub fn relevance(&self, predicate: &str, valid_from: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age = now - valid_from;
        if age <= Duration::zero() {
            return 1.0;
        }
        let half_life = self.half_life(predicate);
        if half_life <= Duration::zero() {
            return 0.0;
        }
        let halves = age.num_milliseconds() as f64 / half_life.num_milliseconds() as f64;
        0.5f64.powf(halves) as f32
    }
}

impl Default for DecayPolicy {
    fn default() -> Self {
        // The regexes are static and known-good; compilation cannot fail.
        Self {
            classes: vec![
                DecayClass {
                    name: "structural".to_string(),
                    pattern: Regex::new(r"(?i)(legal|jurisdiction|incorporat|charter|structure)")
                        .expect("static regex"),
                    half_life: Duration::days(3650),
                },
                DecayClass {
                    name: "market".to_string(),
                    pattern: Regex::new(r"(?i)(price|market|rate|quote|traffic)")
                        .expect("static regex"),
                    half_life: Duration::days(30),
                },
            ],
            default_half_life: Duration::days(180),
        }
    }
}

/// When and how hard to discount a contradicting assertion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictPolicy {
    /// An incumbent above this recomputed confidence is protected.
    pub high_confidence_threshold: f32,
    /// A challenger within this reliability margin of the incumbent counts
    /// as "comparable provenance" and escapes the discount.
    pub reliability_margin: f32,
    /// Fixed discount applied to a contradicting assertion's score.
    pub penalty: f32,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 0.8,
            reliability_margin: 0.05,
            penalty: 0.2,
        }
    }
}

/// The composite scorer.
///
/// Pure and deterministic: the same components, predicate, and `now` always
/// produce the same score. Re-running with a later `now` is expected —
/// confidence is time-dependent, not fixed at write time.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceModel {
    pub weights: ConfidenceWeights,
    pub decay: DecayPolicy,
    pub conflict: ConflictPolicy,
}

impl ConfidenceModel {
    /// Sub-linear corroboration signal: `1 − 2^(−count)`.
    ///
    /// One source scores 0.5, two score 0.75, three 0.875 — diminishing
    /// returns, so a single noisy source duplicated through ingestion can
    /// never masquerade as broad agreement.
    #[must_use]
    pub fn corroboration_signal(count: u32) -> f32 {
        1.0 - 0.5f32.powi(count.min(30) as i32)
    }

    /// Composite confidence of a fact version at `now`.
    #[must_use]
    pub fn score(
        &self,
        predicate: &str,
        components: &ConfidenceComponents,
        valid_from: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f32 {
        let w = self.weights;
        let total =
            w.source_reliability + w.extraction_confidence + w.temporal_relevance + w.corroboration;
        if total <= 0.0 {
            return 0.0;
        }

        let temporal = self.decay.relevance(predicate, valid_from, now);
        let corroboration = Self::corroboration_signal(components.corroborating_sources.max(1));

        let mut score = (w.source_reliability * components.source_reliability.clamp(0.0, 1.0)
            + w.extraction_confidence * components.extraction_confidence.clamp(0.0, 1.0)
            + w.temporal_relevance * temporal
            + w.corroboration * corroboration)
            / total;

        if components.contradicts_incumbent {
            score -= self.conflict.penalty;
        }

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_components() -> ConfidenceComponents {
        ConfidenceComponents::solo(0.8, 0.9)
    }

    #[test]
    fn test_score_in_unit_range() {
        let model = ConfidenceModel::default();
        let now = Utc::now();
        let score = model.score("creditScore", &base_components(), now, now);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_score_is_deterministic() {
        let model = ConfidenceModel::default();
        let now = Utc::now();
        let a = model.score("creditScore", &base_components(), now, now);
        let b = model.score("creditScore", &base_components(), now, now);
        assert_eq!(a, b);
    }

    #[test]
    fn test_decay_monotone_non_increasing() {
        let model = ConfidenceModel::default();
        let from = Utc::now();
        let components = base_components();

        let mut last = f32::INFINITY;
        for days in [0i64, 1, 30, 180, 720, 3650] {
            let score = model.score(
                "creditScore",
                &components,
                from,
                from + Duration::days(days),
            );
            assert!(
                score <= last,
                "score rose from {last} to {score} at {days} days"
            );
            last = score;
        }
    }

    #[test]
    fn test_decay_half_life_at_exact_half() {
        let policy = DecayPolicy::default();
        let from = Utc::now();
        let relevance = policy.relevance("some_predicate", from, from + Duration::days(180));
        assert!((relevance - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decay_classes_calibrate_per_predicate() {
        let policy = DecayPolicy::default();
        let from = Utc::now();
        let now = from + Duration::days(90);

        let structural = policy.relevance("legal_structure", from, now);
        let market = policy.relevance("market_price", from, now);
        assert!(structural > market);
    }

    #[test]
    fn test_decay_future_valid_from_is_full_relevance() {
        let policy = DecayPolicy::default();
        let from = Utc::now();
        assert_eq!(policy.relevance("p", from, from - Duration::days(1)), 1.0);
    }

    #[test]
    fn test_corroboration_diminishing_returns() {
        let one = ConfidenceModel::corroboration_signal(1);
        let two = ConfidenceModel::corroboration_signal(2);
        let three = ConfidenceModel::corroboration_signal(3);

        assert!((one - 0.5).abs() < f32::EPSILON);
        assert!(two > one);
        assert!(three > two);
        // Each additional source is worth less than the previous one.
        assert!(three - two < two - one);
    }

    #[test]
    fn test_corroboration_raises_score() {
        let model = ConfidenceModel::default();
        let now = Utc::now();

        let mut corroborated = base_components();
        corroborated.corroborating_sources = 3;

        let solo = model.score("p", &base_components(), now, now);
        let multi = model.score("p", &corroborated, now, now);
        assert!(multi > solo);
    }

    #[test]
    fn test_contradiction_penalty() {
        let model = ConfidenceModel::default();
        let now = Utc::now();

        let mut contested = base_components();
        contested.contradicts_incumbent = true;

        let clean = model.score("p", &base_components(), now, now);
        let penalized = model.score("p", &contested, now, now);
        assert!((clean - penalized - model.conflict.penalty).abs() < 1e-6);
    }

    #[test]
    fn test_penalty_never_drives_below_zero() {
        let model = ConfidenceModel {
            conflict: ConflictPolicy {
                penalty: 1.0,
                ..ConflictPolicy::default()
            },
            ..ConfidenceModel::default()
        };
        let now = Utc::now();
        let components = ConfidenceComponents {
            source_reliability: 0.1,
            extraction_confidence: 0.1,
            corroborating_sources: 1,
            contradicts_incumbent: true,
        };
        assert_eq!(model.score("p", &components, now, now), 0.0);
    }

    #[test]
    fn test_recompute_after_rerating_changes_score() {
        // Re-rating a source only changes the reliability component fed in;
        // the stored version is untouched and the scorer stays pure.
        let model = ConfidenceModel::default();
        let now = Utc::now();

        let before = model.score("p", &ConfidenceComponents::solo(0.9, 0.9), now, now);
        let after = model.score("p", &ConfidenceComponents::solo(0.2, 0.9), now, now);
        assert!(after < before);
    }
}

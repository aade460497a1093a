//! The Guidance Engine — information-value ranking.
//!
//! Given a decision context (a bounded subgraph plus a target outcome with a
//! base probability), the engine ranks candidate fact-gathering actions by
//! how much observing each predicate would be expected to shrink outcome
//! uncertainty, net of acquisition cost:
//!
//! `expected_gain = H(outcome | evidence) − E_v[H(outcome | evidence, pred=v)]`
//!
//! The outcome model is logistic evidence accumulation: the outcome's
//! log-odds start at the context prior and every in-context fact adds
//! `confidence × influence(predicate, value)`. The expectation over a
//! candidate's values uses corroborated, confidence-weighted base rates from
//! the corpus, falling back to the candidate's configured prior. Every
//! recommendation carries a reasoning path; nothing is a black-box score.

mod entropy;
mod pool;
mod reasoning;

pub use reasoning::{ReasoningPath, ReasoningStep};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{GuidanceError, ValidationError};
use crate::query::Snapshot;
use crate::store::FactStore;
use crate::value::{Value, ValueKey};

use entropy::{binary_entropy, logit, sigmoid};

/// The target uncertain outcome of a decision context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeVariable {
    /// Name of the outcome (e.g. `default_risk`).
    pub name: String,

    /// Evidence-free base probability of the outcome. The engine folds the
    /// context's facts on top of this; it is not the posterior.
    pub prior: f64,
}

impl OutcomeVariable {
    /// Creates an outcome variable.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfidenceOutOfRange` if `prior` is outside
    /// [0.0, 1.0].
    pub fn new(name: impl Into<String>, prior: f64) -> Result<Self, ValidationError> {
        if prior.is_nan() || !(0.0..=1.0).contains(&prior) {
            return Err(ValidationError::ConfidenceOutOfRange {
                value: prior as f32,
            });
        }
        Ok(Self {
            name: name.into(),
            prior,
        })
    }
}

/// A bounded subgraph plus a target outcome — the input to one
/// recommendation request.
///
/// Owned by the caller for the duration of the request; the engine never
/// persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// The evidence subgraph, typically from
    /// [`crate::QueryLayer::neighborhood`].
    pub snapshot: Snapshot,

    /// The outcome being decided.
    pub outcome: OutcomeVariable,
}

impl DecisionContext {
    /// Creates a decision context.
    #[must_use]
    pub const fn new(snapshot: Snapshot, outcome: OutcomeVariable) -> Self {
        Self { snapshot, outcome }
    }
}

/// How one predicate's values move the outcome estimate.
///
/// The signal is in [-1, 1]: booleans map to ±`boolean_sign`, numerics pass
/// through `tanh((x − midpoint) / scale)`, strings look up the categorical
/// table. A value with no signal contributes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Influence {
    /// Log-odds moved by a full-strength signal at confidence 1.
    pub weight: f64,

    /// Center of the numeric response.
    pub numeric_midpoint: f64,

    /// Width of the numeric response; must be positive for numerics to
    /// register.
    pub numeric_scale: f64,

    /// Signals for string values.
    pub categorical: BTreeMap<String, f64>,

    /// Signal of boolean `true` (`false` gets the negation).
    pub boolean_sign: f64,
}

impl Influence {
    /// Influence for a numeric predicate.
    #[must_use]
    pub fn numeric(weight: f64, midpoint: f64, scale: f64) -> Self {
        Self {
            weight,
            numeric_midpoint: midpoint,
            numeric_scale: scale,
            categorical: BTreeMap::new(),
            boolean_sign: 1.0,
        }
    }

    /// Influence for a boolean predicate.
    #[must_use]
    pub fn boolean(weight: f64) -> Self {
        Self {
            weight,
            numeric_midpoint: 0.0,
            numeric_scale: 1.0,
            categorical: BTreeMap::new(),
            boolean_sign: 1.0,
        }
    }

    /// Influence for a categorical predicate.
    #[must_use]
    pub fn categorical(weight: f64, table: BTreeMap<String, f64>) -> Self {
        Self {
            weight,
            numeric_midpoint: 0.0,
            numeric_scale: 1.0,
            categorical: table,
            boolean_sign: 1.0,
        }
    }

    /// The signal of a value, if this influence can read it.
    #[must_use]
    pub fn signal(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Bool(b) => Some(if *b {
                self.boolean_sign
            } else {
                -self.boolean_sign
            }),
            Value::Int(_) | Value::Float(_) => {
                if self.numeric_scale <= 0.0 {
                    return None;
                }
                let x = value.as_float().expect("numeric by match");
                Some(((x - self.numeric_midpoint) / self.numeric_scale).tanh())
            }
            Value::String(s) => self.categorical.get(s).copied(),
            Value::Entity(_) | Value::Structured(_) | Value::Null => None,
        }
    }
}

/// One candidate fact-gathering action's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Cost of acquiring the predicate's value, in the same units as
    /// expected gain (bits).
    pub acquisition_cost: f64,

    /// Prior value distribution used when the corpus has no base rates.
    /// Weights need not be normalized.
    pub prior: Vec<(Value, f64)>,
}

/// Guidance configuration: candidate catalog, influence models, thresholds.
#[derive(Debug, Clone)]
pub struct GuidanceConfig {
    /// Candidate predicates by name.
    pub candidates: BTreeMap<String, CandidateSpec>,

    /// Influence models by predicate name.
    pub influence: BTreeMap<String, Influence>,

    /// A candidate already present in the context at or above this
    /// confidence is not worth re-acquiring.
    pub known_confidence_threshold: f32,

    /// Maximum steps reported in a reasoning path.
    pub reasoning_depth: usize,

    /// Worker threads for candidate evaluation.
    pub workers: usize,
}

impl GuidanceConfig {
    /// Creates a config with default thresholds and no catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            candidates: BTreeMap::new(),
            influence: BTreeMap::new(),
            known_confidence_threshold: 0.5,
            reasoning_depth: 5,
            workers: 4,
        }
    }

    /// Adds a candidate predicate.
    #[must_use]
    pub fn with_candidate(
        mut self,
        predicate: impl Into<String>,
        acquisition_cost: f64,
        prior: Vec<(Value, f64)>,
    ) -> Self {
        self.candidates.insert(
            predicate.into(),
            CandidateSpec {
                acquisition_cost,
                prior,
            },
        );
        self
    }

    /// Adds an influence model.
    #[must_use]
    pub fn with_influence(mut self, predicate: impl Into<String>, influence: Influence) -> Self {
        self.influence.insert(predicate.into(), influence);
        self
    }
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A ranked fact-gathering action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAction {
    /// Which predicate to acquire.
    pub predicate: String,

    /// On which entity.
    pub subject: EntityId,

    /// Configured acquisition cost.
    pub acquisition_cost: f64,

    /// Expected entropy reduction, in bits.
    pub expected_gain: f64,

    /// `expected_gain − acquisition_cost`; the ranking key.
    pub net_value: f64,
}

/// Why a configured candidate was left out of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The context already holds this predicate confidently enough.
    AlreadyKnown {
        confidence: f32,
    },

    /// Neither corpus base rates nor a configured prior exist, so the
    /// expectation over values is undefined.
    NoDistribution,
}

/// A candidate excluded from the ranking, with its reason — reported, never
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    /// The candidate predicate.
    pub predicate: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// The output of one recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Actions in descending net value (ties: ascending cost, then
    /// predicate order). Deterministic for identical inputs.
    pub actions: Vec<CandidateAction>,

    /// Candidates excluded from the ranking.
    pub skipped: Vec<SkippedCandidate>,

    /// The explanation behind the current outcome estimate.
    pub reasoning: ReasoningPath,
}

/// One fact's contribution to the outcome estimate.
struct Contribution {
    triple: crate::triple::TripleId,
    predicate: String,
    value: Value,
    confidence: f32,
    delta: f64,
}

/// Work unit for one candidate evaluation.
struct CandidateJob {
    predicate: String,
    subject: EntityId,
    acquisition_cost: f64,
    distribution: Vec<(Value, f64)>,
    influence: Option<Influence>,
    base_logit: f64,
    current_entropy: f64,
}

/// Information-value ranking over a fact store.
#[derive(Debug, Clone)]
pub struct GuidanceEngine {
    store: Arc<FactStore>,
    config: GuidanceConfig,
}

impl GuidanceEngine {
    /// Creates a guidance engine.
    #[must_use]
    pub fn new(store: Arc<FactStore>, config: GuidanceConfig) -> Self {
        Self { store, config }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    /// Ranks candidate information-gathering actions for a decision context.
    ///
    /// Read-only and side-effect-free; candidate evaluation fans out across
    /// the configured worker pool and results are reassembled in
    /// deterministic order.
    ///
    /// # Errors
    ///
    /// `InsufficientContext` when no fact in the context bears on the
    /// outcome (no influential predicate present).
    pub fn recommend(&self, ctx: &DecisionContext) -> Result<Recommendation, GuidanceError> {
        let contributions = self.contributions(&ctx.snapshot);
        if contributions.is_empty() {
            return Err(GuidanceError::InsufficientContext {
                entity: ctx.snapshot.entity,
                outcome: ctx.outcome.name.clone(),
            });
        }

        let current_logit =
            logit(ctx.outcome.prior) + contributions.iter().map(|c| c.delta).sum::<f64>();
        let probability = sigmoid(current_logit);
        let current_entropy = binary_entropy(probability);

        let (jobs, skipped) = self.build_jobs(ctx, current_logit, current_entropy, &contributions);

        let mut actions = pool::parallel_map(jobs, self.config.workers, evaluate_candidate);
        actions.sort_by(|a, b| {
            b.net_value
                .total_cmp(&a.net_value)
                .then(a.acquisition_cost.total_cmp(&b.acquisition_cost))
                .then_with(|| a.predicate.cmp(&b.predicate))
        });

        let reasoning = self.reasoning_path(&ctx.outcome.name, probability, current_entropy, contributions);
        tracing::debug!(
            entity = %ctx.snapshot.entity,
            outcome = %ctx.outcome.name,
            probability,
            ranked = actions.len(),
            skipped = skipped.len(),
            "recommendation computed"
        );

        Ok(Recommendation {
            actions,
            skipped,
            reasoning,
        })
    }

    /// The facts bearing on the outcome, with their log-odds deltas.
    fn contributions(&self, snapshot: &Snapshot) -> Vec<Contribution> {
        let mut out = Vec::new();
        for fact in snapshot.facts.values() {
            let Some(influence) = self.config.influence.get(&fact.key.predicate) else {
                continue;
            };
            let Some(signal) = influence.signal(&fact.value) else {
                continue;
            };
            out.push(Contribution {
                triple: fact.triple,
                predicate: fact.key.predicate.clone(),
                value: fact.value.clone(),
                confidence: fact.confidence,
                delta: influence.weight * f64::from(fact.confidence) * signal,
            });
        }
        out
    }

    fn build_jobs(
        &self,
        ctx: &DecisionContext,
        current_logit: f64,
        current_entropy: f64,
        contributions: &[Contribution],
    ) -> (Vec<CandidateJob>, Vec<SkippedCandidate>) {
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();

        for (predicate, spec) in &self.config.candidates {
            if let Some(confidence) = ctx.snapshot.best_confidence_for(predicate) {
                if confidence >= self.config.known_confidence_threshold {
                    skipped.push(SkippedCandidate {
                        predicate: predicate.clone(),
                        reason: SkipReason::AlreadyKnown { confidence },
                    });
                    continue;
                }
            }

            let distribution = {
                let rates = self.base_rates(predicate);
                if rates.is_empty() {
                    normalize(&spec.prior)
                } else {
                    rates
                }
            };
            if distribution.is_empty() {
                tracing::debug!(%predicate, "candidate has no base rates and no prior");
                skipped.push(SkippedCandidate {
                    predicate: predicate.clone(),
                    reason: SkipReason::NoDistribution,
                });
                continue;
            }

            // Observing the true value supersedes whatever low-confidence
            // evidence the context already holds for this predicate.
            let existing: f64 = contributions
                .iter()
                .filter(|c| &c.predicate == predicate)
                .map(|c| c.delta)
                .sum();

            jobs.push(CandidateJob {
                predicate: predicate.clone(),
                subject: ctx.snapshot.entity,
                acquisition_cost: spec.acquisition_cost,
                distribution,
                influence: self.config.influence.get(predicate).cloned(),
                base_logit: current_logit - existing,
                current_entropy,
            });
        }
        (jobs, skipped)
    }

    /// Corpus base rates: a confidence-weighted histogram over the
    /// semantically-distinct values every chain of this predicate has held.
    fn base_rates(&self, predicate: &str) -> Vec<(Value, f64)> {
        let mut histogram: BTreeMap<ValueKey, (Value, f64)> = BTreeMap::new();
        for triple in self.store.triples_for_predicate(predicate) {
            let Ok(history) = self.store.history(triple) else {
                continue;
            };
            for version in history {
                let weight = f64::from(version.confidence);
                if weight <= 0.0 {
                    continue;
                }
                histogram
                    .entry(version.value.semantic_key())
                    .and_modify(|(_, w)| *w += weight)
                    .or_insert((version.value.clone(), weight));
            }
        }
        let weighted: Vec<(Value, f64)> = histogram.into_values().collect();
        normalize(&weighted)
    }

    fn reasoning_path(
        &self,
        outcome: &str,
        probability: f64,
        entropy: f64,
        mut contributions: Vec<Contribution>,
    ) -> ReasoningPath {
        contributions.sort_by(|a, b| {
            b.delta
                .abs()
                .total_cmp(&a.delta.abs())
                .then_with(|| a.predicate.cmp(&b.predicate))
        });
        contributions.truncate(self.config.reasoning_depth);

        ReasoningPath {
            outcome: outcome.to_string(),
            probability,
            entropy,
            steps: contributions
                .into_iter()
                .map(|c| ReasoningStep {
                    triple: c.triple,
                    predicate: c.predicate,
                    value: c.value,
                    confidence: c.confidence,
                    contribution: c.delta,
                })
                .collect(),
        }
    }
}

/// Expected posterior entropy over the candidate's value distribution,
/// turned into a net-valued action.
fn evaluate_candidate(job: CandidateJob) -> CandidateAction {
    let expected_posterior_entropy: f64 = job
        .distribution
        .iter()
        .map(|(value, p)| {
            let delta = job
                .influence
                .as_ref()
                .and_then(|inf| inf.signal(value).map(|s| inf.weight * s))
                .unwrap_or(0.0);
            p * binary_entropy(sigmoid(job.base_logit + delta))
        })
        .sum();

    // Gains below zero mean the observation cannot shrink uncertainty under
    // this model; clamp so cost alone decides the ranking there.
    let expected_gain = (job.current_entropy - expected_posterior_entropy).max(0.0);
    CandidateAction {
        predicate: job.predicate,
        subject: job.subject,
        acquisition_cost: job.acquisition_cost,
        expected_gain,
        net_value: expected_gain - job.acquisition_cost,
    }
}

fn normalize(weighted: &[(Value, f64)]) -> Vec<(Value, f64)> {
    let total: f64 = weighted.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    weighted
        .iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|(v, w)| (v.clone(), w / total))
        .collect()
}

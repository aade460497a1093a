//! Reasoning paths — the explanation attached to every recommendation.
//!
//! A recommendation is never a bare score. The path lists the facts that
//! moved the outcome estimate most, each with its confidence and signed
//! contribution, reconstructed from the contribution weights the outcome
//! model actually used.

use serde::{Deserialize, Serialize};

use crate::triple::TripleId;
use crate::value::Value;

/// One contributing fact in a reasoning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// The contributing triple identity.
    pub triple: TripleId,

    /// Predicate name, for readability.
    pub predicate: String,

    /// The value that contributed.
    pub value: Value,

    /// The fact's confidence at evaluation time.
    pub confidence: f32,

    /// Signed log-odds contribution to the outcome estimate. Positive
    /// pushed the outcome probability up.
    pub contribution: f64,
}

/// The ordered explanation behind an outcome estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPath {
    /// Name of the outcome variable.
    pub outcome: String,

    /// Evidence-updated outcome probability.
    pub probability: f64,

    /// Binary entropy of the estimate, in bits.
    pub entropy: f64,

    /// Contributing facts, largest absolute contribution first.
    pub steps: Vec<ReasoningStep>,
}

impl std::fmt::Display for ReasoningPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "outcome '{}': p={:.3} (H={:.3} bits)",
            self.outcome, self.probability, self.entropy
        )?;
        for step in &self.steps {
            writeln!(
                f,
                "  {} = {} (confidence {:.2}) -> {:+.3}",
                step.predicate, step.value, step.confidence, step.contribution
            )?;
        }
        Ok(())
    }
}

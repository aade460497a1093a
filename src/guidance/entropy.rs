//! Entropy and log-odds helpers for the outcome model.

/// Probabilities are clamped this far from 0 and 1 before log-odds, so a
/// saturated prior stays finite and recoverable.
const EPSILON: f64 = 1e-9;

/// Shannon entropy of a binary outcome, in bits. Zero at certainty.
#[must_use]
pub(crate) fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Log-odds of a probability.
#[must_use]
pub(crate) fn logit(p: f64) -> f64 {
    let p = p.clamp(EPSILON, 1.0 - EPSILON);
    (p / (1.0 - p)).ln()
}

/// Inverse of [`logit`].
#[must_use]
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

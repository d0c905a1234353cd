//! Deterministic confidence model.
//!
//! The formulas here are contractual: the same match type and similarity
//! must always reproduce the same confidence, factor list, and level, so
//! suggestions are comparable across runs and deployments.

use serde::{Deserialize, Serialize};

use crate::types::{ConfidenceFactor, ConfidenceLevel};

/// Below this a match is never surfaced as a suggestion.
pub const MIN_SUGGESTION_CONFIDENCE: f64 = 0.5;

/// Flat confidence for normalized-value equality, independent of which
/// strategy found it.
pub const EXACT_STRING_CONFIDENCE: f64 = 0.95;

/// Minimum similarity for a fuzzy match to be surfaced at all.
pub const FUZZY_SIMILARITY_FLOOR: f64 = 0.70;

/// A scored match: continuous value, discrete level, and the ordered
/// factors that produced it. Factor weights sum to 1.0 per match type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Confidence {
    pub value: f64,
    pub level: ConfidenceLevel,
    pub factors: Vec<ConfidenceFactor>,
}

impl Confidence {
    fn from_factors(factors: Vec<ConfidenceFactor>) -> Self {
        let value = clamp01(weighted_average(&factors));
        Confidence {
            value,
            level: level_for(value),
            factors,
        }
    }

}

/// Confidence for identical binary content: exactly 1.0.
pub fn hash_match() -> Confidence {
    Confidence::from_factors(vec![ConfidenceFactor::new(
        "binary content identical",
        1.0,
        1.0,
    )])
}

/// Confidence for normalized-value equality: exactly 0.95.
pub fn exact_string() -> Confidence {
    Confidence::from_factors(vec![ConfidenceFactor::new(
        "normalized value identical",
        1.0,
        EXACT_STRING_CONFIDENCE,
    )])
}

/// Confidence for the best fuzzy similarity found, banded:
///
/// - `s ≥ 0.90` → 0.9
/// - `0.80 ≤ s < 0.90` → `0.7 + (s − 0.80) × 2.0`
/// - `0.70 ≤ s < 0.80` → `0.5 + (s − 0.70) × 2.0`
/// - below 0.70 the match is not surfaced (`None`)
///
/// The stored factor's score is the banded contribution, so the weighted
/// average of factors reproduces the confidence exactly; the raw
/// similarity is kept in the factor name for audit.
pub fn fuzzy(similarity: f64, strategy: &str) -> Option<Confidence> {
    let value = fuzzy_confidence(similarity)?;
    Some(Confidence::from_factors(vec![ConfidenceFactor::new(
        format!("string similarity {similarity:.3} ({strategy})"),
        1.0,
        value,
    )]))
}

/// The banded fuzzy mapping without factor construction.
pub fn fuzzy_confidence(similarity: f64) -> Option<f64> {
    if similarity >= 0.90 {
        Some(0.9)
    } else if similarity >= 0.80 {
        Some(0.7 + (similarity - 0.80) * 2.0)
    } else if similarity >= FUZZY_SIMILARITY_FLOOR {
        Some(0.5 + (similarity - 0.70) * 2.0)
    } else {
        None
    }
}

/// Uniform level bucketing: `≥ 0.9` high, `0.7–0.89` medium,
/// `0.5–0.69` low.
pub fn level_for(confidence: f64) -> ConfidenceLevel {
    if confidence >= 0.9 {
        ConfidenceLevel::High
    } else if confidence >= 0.7 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

pub fn weighted_average(factors: &[ConfidenceFactor]) -> f64 {
    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    factors.iter().map(|f| f.weight * f.score).sum::<f64>() / total_weight
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

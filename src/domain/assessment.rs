//! Risk assessment result.

use serde::{Deserialize, Serialize};

/// Probability at or above which a record is classified as heart disease.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Output of one assessment. Produced per request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessmentResult {
    /// Positive-class probability in [0, 1]
    pub risk_probability: f64,

    /// `risk_probability >= DECISION_THRESHOLD`
    pub has_heart_disease: bool,
}

impl RiskAssessmentResult {
    /// Apply the inclusive decision threshold to a model probability.
    #[must_use]
    pub fn from_probability(risk_probability: f64) -> Self {
        Self {
            risk_probability,
            has_heart_disease: risk_probability >= DECISION_THRESHOLD,
        }
    }
}

impl std::fmt::Display for RiskAssessmentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = if self.has_heart_disease {
            "POSITIVE"
        } else {
            "NEGATIVE"
        };
        write!(f, "{label} ({:.1}%)", self.risk_probability * 100.0)
    }
}

use crate::domain::error::EvaluationError;
use crate::domain::risk::{ensure_probability, RiskTier};
use crate::engine::rules::TierThresholds;

/// Maps a churn probability onto a risk tier. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskClassifier {
    thresholds: TierThresholds,
}

impl RiskClassifier {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> TierThresholds {
        self.thresholds
    }

    pub fn classify(&self, probability: f64) -> Result<RiskTier, EvaluationError> {
        ensure_probability(probability)?;
        let tier = if probability >= self.thresholds.high {
            RiskTier::High
        } else if probability >= self.thresholds.moderate {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        };
        Ok(tier)
    }
}

/// Classifies with the default 0.70 / 0.40 thresholds.
pub fn classify(probability: f64) -> Result<RiskTier, EvaluationError> {
    RiskClassifier::default().classify(probability)
}

use crate::domain::error::EvaluationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability at or above which a prediction is labelled churn when the predictor omits a label.
pub const DEFAULT_LABEL_CUTOFF: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Moderate, RiskTier::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        }
    }

    pub fn urgency(self) -> Urgency {
        match self {
            Self::Low => Urgency::Low,
            Self::Moderate => Urgency::Moderate,
            Self::High => Urgency::Urgent,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MODERATE" => Some(Self::Moderate),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    Moderate,
    Urgent,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictedLabel {
    #[serde(alias = "Stay", alias = "STAY")]
    Stay,
    #[serde(alias = "Churn", alias = "CHURN")]
    Churn,
}

impl PredictedLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stay => "Stay",
            Self::Churn => "Churn",
        }
    }
}

/// Output of the external predictor for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub predicted_label: PredictedLabel,
}

impl PredictionResult {
    /// Rejects probabilities outside `[0, 1]`; no clamping.
    pub fn try_new(
        probability: f64,
        predicted_label: Option<PredictedLabel>,
    ) -> Result<Self, EvaluationError> {
        ensure_probability(probability)?;
        let predicted_label = predicted_label.unwrap_or(if probability >= DEFAULT_LABEL_CUTOFF {
            PredictedLabel::Churn
        } else {
            PredictedLabel::Stay
        });
        Ok(Self {
            probability,
            predicted_label,
        })
    }

    pub fn stay_probability(&self) -> f64 {
        1.0 - self.probability
    }

    /// Whole-number percentage as shown to operators, e.g. `0.94` -> `94`.
    pub fn percent(&self) -> u32 {
        percent(self.probability)
    }
}

pub(crate) fn ensure_probability(probability: f64) -> Result<(), EvaluationError> {
    if probability.is_nan() || !(0.0..=1.0).contains(&probability) {
        return Err(EvaluationError::InvalidProbability { value: probability });
    }
    Ok(())
}

/// Halves round to even, so `0.125` shows as `12`.
pub(crate) fn percent(probability: f64) -> u32 {
    (probability * 100.0).round_ties_even() as u32
}

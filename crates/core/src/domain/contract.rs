use crate::domain::error::EvaluationError;
use crate::domain::features::{FeatureSnapshot, FeatureValue};
use crate::domain::risk::{PredictedLabel, PredictionResult};
use crate::explain::FeatureAttribution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire shape of one evaluation, as received from the API or a batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub churn_probability: f64,
    #[serde(default)]
    pub predicted_label: Option<PredictedLabel>,
    pub features: BTreeMap<String, FeatureValue>,
    #[serde(default)]
    pub attributions: Option<Vec<FeatureAttribution>>,
}

/// Validated evaluation input.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationInput {
    pub customer_id: Option<String>,
    pub prediction: PredictionResult,
    pub features: FeatureSnapshot,
    pub attributions: Vec<FeatureAttribution>,
}

impl EvaluationRequest {
    /// Reads one loosely-typed record; shape errors become `InvalidRequest`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, EvaluationError> {
        serde_json::from_value(value).map_err(|e| EvaluationError::InvalidRequest {
            detail: e.to_string(),
        })
    }

    pub fn validate_and_into_input(self) -> Result<EvaluationInput, EvaluationError> {
        let prediction = PredictionResult::try_new(self.churn_probability, self.predicted_label)?;
        let features = FeatureSnapshot::from_map(&self.features)?;

        let attributions = self.attributions.unwrap_or_default();
        for attribution in &attributions {
            if attribution.feature.trim().is_empty() {
                return Err(EvaluationError::InvalidFeature {
                    field: attribution.feature.clone(),
                    detail: "attribution feature name must be non-empty".to_string(),
                });
            }
            if !attribution.contribution.is_finite() {
                return Err(EvaluationError::InvalidFeature {
                    field: attribution.feature.clone(),
                    detail: format!(
                        "attribution must be finite (got {})",
                        attribution.contribution
                    ),
                });
            }
        }

        let customer_id = self
            .customer_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(EvaluationInput {
            customer_id,
            prediction,
            features,
            attributions,
        })
    }
}

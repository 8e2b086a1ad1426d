pub mod contract;
pub mod error;
pub mod features;
pub mod recommendation;
pub mod risk;

pub use error::EvaluationError;
pub use features::{Feature, FeatureSnapshot, FeatureValue};
pub use recommendation::{ActionCategory, FactorInsight, Recommendation, RecommendationReport};
pub use risk::{PredictedLabel, PredictionResult, RiskTier, Urgency};

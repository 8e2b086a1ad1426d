pub mod classifier;
pub mod recommend;
pub mod rules;

pub use classifier::{classify, RiskClassifier};
pub use recommend::RecommendationEngine;
pub use rules::{FactorTrigger, RuleSet, TierPolicy, TierThresholds};

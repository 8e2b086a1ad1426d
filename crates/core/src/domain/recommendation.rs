use crate::domain::features::{Feature, FeatureValue};
use crate::domain::risk::{PredictedLabel, RiskTier, Urgency};
use crate::explain::Explanation;
use serde::{Deserialize, Serialize};

/// Number of actions surfaced as "recommended" in reports.
pub const RECOMMENDED_ACTIONS_LEN: usize = 5;

/// Ordering bucket for actions. Declaration order is urgency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Payment,
    Engagement,
    Support,
    Onboarding,
    Value,
    Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    /// 1 = most urgent.
    pub priority: u32,
    pub category: ActionCategory,
}

/// Why a factor trigger fired for this customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorInsight {
    pub feature: Feature,
    pub value: FeatureValue,
    pub reason: String,
    pub action: String,
    pub is_top_factor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub probability: f64,
    pub predicted_label: PredictedLabel,
    pub tier: RiskTier,
    pub urgency: Urgency,
    pub status: String,
    /// Tier-level summary of the response, e.g. "Immediate retention intervention required".
    pub headline: String,
    pub primary_action: String,
    pub actions: Vec<Recommendation>,
    /// Text of the leading [`RECOMMENDED_ACTIONS_LEN`] actions.
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    pub factor_insights: Vec<FactorInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

pub fn leading_actions(actions: &[Recommendation]) -> Vec<String> {
    actions
        .iter()
        .take(RECOMMENDED_ACTIONS_LEN)
        .map(|r| r.action.clone())
        .collect()
}

impl RecommendationReport {
    pub fn contains_action(&self, action: &str) -> bool {
        self.actions.iter().any(|r| r.action == action)
    }

    pub fn position_of(&self, action: &str) -> Option<usize> {
        self.actions.iter().position(|r| r.action == action)
    }
}

use crate::domain::contract::EvaluationInput;
use crate::domain::error::EvaluationError;
use crate::domain::features::FeatureSnapshot;
use crate::domain::recommendation::{
    leading_actions, ActionCategory, FactorInsight, Recommendation, RecommendationReport,
};
use crate::domain::risk::{percent, PredictionResult, RiskTier};
use crate::engine::classifier::RiskClassifier;
use crate::engine::rules::RuleSet;
use crate::explain::{self, FeatureAttribution, DEFAULT_TOP_FACTORS};
use std::collections::HashSet;
use std::sync::Arc;

/// Turns a classified prediction plus customer features into an ordered action plan.
///
/// Holds a validated, read-only [`RuleSet`]; cloning is cheap and clones share the table.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    rules: Arc<RuleSet>,
    classifier: RiskClassifier,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        let rules = RuleSet::default();
        Self {
            classifier: RiskClassifier::new(rules.thresholds),
            rules: Arc::new(rules),
        }
    }
}

impl RecommendationEngine {
    pub fn new(rules: RuleSet) -> Result<Self, EvaluationError> {
        Self::from_shared(Arc::new(rules))
    }

    pub fn from_shared(rules: Arc<RuleSet>) -> Result<Self, EvaluationError> {
        rules.validate()?;
        Ok(Self {
            classifier: RiskClassifier::new(rules.thresholds),
            rules,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn classify(&self, probability: f64) -> Result<RiskTier, EvaluationError> {
        self.classifier.classify(probability)
    }

    /// Classifies and recommends in one step.
    pub fn evaluate(&self, input: &EvaluationInput) -> Result<RecommendationReport, EvaluationError> {
        let tier = self.classify(input.prediction.probability)?;
        self.recommend(&input.prediction, tier, &input.features, &input.attributions)
    }

    /// Builds the ordered action list for `tier`.
    ///
    /// Fired factor actions and the tier's base actions are merged, ordered by
    /// [`ActionCategory`] (payment, engagement, support, onboarding, value, then tier),
    /// and de-duplicated by action text keeping the most urgent occurrence. Within a
    /// category, rule-table order is kept. Attributions only mark insights as top factors.
    pub fn recommend(
        &self,
        prediction: &PredictionResult,
        tier: RiskTier,
        features: &FeatureSnapshot,
        attributions: &[FeatureAttribution],
    ) -> Result<RecommendationReport, EvaluationError> {
        let policy = self.rules.policy(tier)?;
        let top = explain::top_features(attributions, DEFAULT_TOP_FACTORS);

        let mut candidates: Vec<(ActionCategory, &str)> = Vec::new();
        let mut insights = Vec::new();
        for trigger in self.rules.fired_triggers(features) {
            candidates.push((trigger.category, trigger.action.as_str()));
            insights.push(FactorInsight {
                feature: trigger.feature,
                value: features.value(trigger.feature),
                reason: trigger.reason.clone(),
                action: trigger.action.clone(),
                is_top_factor: top.contains(&trigger.feature),
            });
        }
        candidates.extend(
            policy
                .actions
                .iter()
                .map(|a| (ActionCategory::Tier, a.as_str())),
        );

        // Stable: equal categories keep rule-table order.
        candidates.sort_by_key(|(category, _)| *category);
        insights.sort_by_key(|i| {
            top.iter()
                .position(|f| *f == i.feature)
                .unwrap_or(usize::MAX)
        });

        let mut seen = HashSet::new();
        let actions: Vec<Recommendation> = candidates
            .into_iter()
            .filter(|(_, action)| seen.insert(action.trim()))
            .enumerate()
            .map(|(i, (category, action))| Recommendation {
                action: action.trim().to_string(),
                priority: (i + 1) as u32,
                category,
            })
            .collect();

        let primary_action = actions
            .first()
            .map(|r| r.action.clone())
            .ok_or_else(|| EvaluationError::InvalidRules {
                detail: format!("{tier} produced no actions"),
            })?;

        let explanation = (!attributions.is_empty())
            .then(|| explain::explain(attributions, Some(features), DEFAULT_TOP_FACTORS));

        tracing::debug!(
            %tier,
            probability = prediction.probability,
            actions_len = actions.len(),
            factors_fired = insights.len(),
            "built recommendation"
        );

        Ok(RecommendationReport {
            probability: prediction.probability,
            predicted_label: prediction.predicted_label,
            tier,
            urgency: tier.urgency(),
            status: status_line(prediction.probability, tier),
            headline: policy.headline.clone(),
            primary_action,
            recommended_actions: leading_actions(&actions),
            actions,
            factor_insights: insights,
            explanation,
        })
    }
}

pub fn status_line(probability: f64, tier: RiskTier) -> String {
    let pct = percent(probability);
    match tier {
        RiskTier::High => format!(
            "ALERT: This customer has a {pct}% probability of churning ({tier} risk). Immediate action required!"
        ),
        RiskTier::Moderate => format!(
            "CAUTION: This customer has a {pct}% probability of churning ({tier} risk). Proactive engagement recommended."
        ),
        RiskTier::Low => format!(
            "OK: This customer has a low churn risk ({pct}%, {tier} risk). Continue standard engagement."
        ),
    }
}

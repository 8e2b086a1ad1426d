use crate::domain::error::EvaluationError;
use crate::domain::features::{Feature, FeatureKind, FeatureSnapshot};
use crate::domain::recommendation::ActionCategory;
use crate::domain::risk::RiskTier;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.70;
pub const DEFAULT_MODERATE_THRESHOLD: f64 = 0.40;

/// Lower bounds (inclusive) of the moderate and high tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: f64,
    pub moderate: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            moderate: DEFAULT_MODERATE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub headline: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
        }
    }
}

/// One independent threshold check on a numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTrigger {
    pub feature: Feature,
    pub comparison: Comparison,
    pub threshold: f64,
    pub category: ActionCategory,
    pub action: String,
    pub reason: String,
}

impl FactorTrigger {
    fn new(
        feature: Feature,
        comparison: Comparison,
        threshold: f64,
        category: ActionCategory,
        action: &str,
        reason: &str,
    ) -> Self {
        Self {
            feature,
            comparison,
            threshold,
            category,
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn fires(&self, snapshot: &FeatureSnapshot) -> bool {
        snapshot
            .numeric(self.feature)
            .is_some_and(|v| self.comparison.holds(v, self.threshold))
    }
}

/// Immutable decision table: tier thresholds, per-tier base actions and factor triggers.
///
/// Trigger order matters only as the tie-break within an [`ActionCategory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub thresholds: TierThresholds,
    pub tiers: BTreeMap<RiskTier, TierPolicy>,
    pub triggers: Vec<FactorTrigger>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let policy = |headline: &str, actions: &[&str]| TierPolicy {
            headline: headline.to_string(),
            actions: actions.iter().map(|s| s.to_string()).collect(),
        };

        let mut tiers = BTreeMap::new();
        tiers.insert(
            RiskTier::High,
            policy(
                "Immediate retention intervention required",
                &[
                    "Offer personalized discount (20-30% off)",
                    "Assign dedicated account manager",
                    "Send personalized retention message",
                    "Offer free premium features trial",
                ],
            ),
        );
        tiers.insert(
            RiskTier::Moderate,
            policy(
                "Proactive engagement recommended",
                &[
                    "Send re-engagement notification",
                    "Offer limited-time discount (10-15% off)",
                    "Highlight new features via email",
                    "Invite to customer feedback survey",
                ],
            ),
        );
        tiers.insert(
            RiskTier::Low,
            policy(
                "Standard customer maintenance",
                &[
                    "Continue regular engagement",
                    "Include in loyalty rewards program",
                ],
            ),
        );

        use ActionCategory::*;
        use Comparison::*;
        let triggers = vec![
            FactorTrigger::new(
                Feature::PaymentFailures,
                GreaterThan,
                0.0,
                Payment,
                "Reach out to resolve payment issues and offer alternative payment methods",
                "Payment problems detected",
            ),
            FactorTrigger::new(
                Feature::LastLoginDays,
                GreaterThan,
                30.0,
                Engagement,
                "Send re-engagement content with exclusive picks",
                "Customer has not logged in recently",
            ),
            FactorTrigger::new(
                Feature::LoginFrequency,
                LessThan,
                5.0,
                Engagement,
                "Recommend personalized content based on past preferences",
                "Low engagement - customer rarely logs in",
            ),
            FactorTrigger::new(
                Feature::WatchTime,
                LessThan,
                10.0,
                Engagement,
                "Send curated content recommendations to boost engagement",
                "Low content consumption",
            ),
            FactorTrigger::new(
                Feature::CustomerSupportCalls,
                GreaterThan,
                3.0,
                Support,
                "Proactive outreach to resolve ongoing issues",
                "Multiple support interactions indicate frustration",
            ),
            FactorTrigger::new(
                Feature::TenureInMonths,
                LessThan,
                6.0,
                Onboarding,
                "Onboarding follow-up to ensure customer is getting value",
                "New customer - critical retention period",
            ),
            FactorTrigger::new(
                Feature::MonthlyCharges,
                GreaterThan,
                25.0,
                Value,
                "Highlight value proposition and premium benefits",
                "High subscription cost may affect retention",
            ),
        ];

        Self {
            thresholds: TierThresholds::default(),
            tiers,
            triggers,
        }
    }
}

impl RuleSet {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let rules = serde_json::from_str::<Self>(s).context("rule table is not valid JSON")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rule table {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn policy(&self, tier: RiskTier) -> Result<&TierPolicy, EvaluationError> {
        self.tiers.get(&tier).ok_or_else(|| EvaluationError::UnknownTier {
            tier: tier.as_str().to_string(),
        })
    }

    pub fn fired_triggers<'a>(
        &'a self,
        snapshot: &'a FeatureSnapshot,
    ) -> impl Iterator<Item = &'a FactorTrigger> + 'a {
        self.triggers.iter().filter(move |t| t.fires(snapshot))
    }

    pub fn validate(&self) -> Result<(), EvaluationError> {
        let invalid = |detail: String| EvaluationError::InvalidRules { detail };

        let TierThresholds { high, moderate } = self.thresholds;
        if !(moderate > 0.0 && moderate < high && high <= 1.0) {
            return Err(invalid(format!(
                "thresholds must satisfy 0 < moderate < high <= 1 (got moderate={moderate}, high={high})"
            )));
        }

        for tier in RiskTier::ALL {
            let policy = self.policy(tier)?;
            if policy.headline.trim().is_empty() {
                return Err(invalid(format!("{tier} headline must be non-empty")));
            }
            if policy.actions.is_empty() {
                return Err(invalid(format!("{tier} must list at least one action")));
            }
            if policy.actions.iter().any(|a| a.trim().is_empty()) {
                return Err(invalid(format!("{tier} actions must be non-empty")));
            }
        }

        let mut seen = BTreeSet::new();
        for trigger in &self.triggers {
            if trigger.feature.kind() != FeatureKind::Numeric {
                return Err(invalid(format!(
                    "trigger on {} must target a numeric feature",
                    trigger.feature
                )));
            }
            if trigger.category == ActionCategory::Tier {
                return Err(invalid(format!(
                    "trigger on {} cannot use the tier category",
                    trigger.feature
                )));
            }
            if !trigger.threshold.is_finite() {
                return Err(invalid(format!(
                    "trigger on {} has a non-finite threshold",
                    trigger.feature
                )));
            }
            if trigger.action.trim().is_empty() {
                return Err(invalid(format!(
                    "trigger on {} has an empty action",
                    trigger.feature
                )));
            }
            if !seen.insert((trigger.feature, trigger.action.trim().to_string())) {
                return Err(invalid(format!(
                    "duplicate trigger on {}: {}",
                    trigger.feature, trigger.action
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::tests::{high_risk_map, quiet_map};
    use std::io::Write;

    #[test]
    fn default_rules_validate() {
        RuleSet::default().validate().unwrap();
    }

    #[test]
    fn every_trigger_fires_for_high_risk_profile_except_value() {
        let rules = RuleSet::default();
        let snap = FeatureSnapshot::from_map(&high_risk_map()).unwrap();
        let fired: Vec<Feature> = rules.fired_triggers(&snap).map(|t| t.feature).collect();
        assert_eq!(
            fired,
            vec![
                Feature::PaymentFailures,
                Feature::LastLoginDays,
                Feature::LoginFrequency,
                Feature::WatchTime,
                Feature::CustomerSupportCalls,
                Feature::TenureInMonths,
            ]
        );
    }

    #[test]
    fn nothing_fires_for_quiet_profile() {
        let rules = RuleSet::default();
        let snap = FeatureSnapshot::from_map(&quiet_map()).unwrap();
        assert_eq!(rules.fired_triggers(&snap).count(), 0);
    }

    #[test]
    fn trigger_thresholds_are_strict() {
        let rules = RuleSet::default();
        let mut snap = FeatureSnapshot::from_map(&quiet_map()).unwrap();
        let last_login = rules
            .triggers
            .iter()
            .find(|t| t.feature == Feature::LastLoginDays)
            .unwrap();

        snap.last_login_days = 30.0;
        assert!(!last_login.fires(&snap));
        snap.last_login_days = 31.0;
        assert!(last_login.fires(&snap));
    }

    #[test]
    fn missing_tier_is_unknown_tier() {
        let mut rules = RuleSet::default();
        rules.tiers.remove(&RiskTier::Moderate);
        assert_eq!(
            rules.policy(RiskTier::Moderate).unwrap_err(),
            EvaluationError::UnknownTier {
                tier: "MODERATE".to_string()
            }
        );
        assert!(rules.validate().is_err());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut rules = RuleSet::default();
        rules.thresholds = TierThresholds {
            high: 0.3,
            moderate: 0.6,
        };
        assert_eq!(rules.validate().unwrap_err().kind(), "invalid_rules");
    }

    #[test]
    fn rejects_categorical_trigger() {
        let mut rules = RuleSet::default();
        rules.triggers[0].feature = Feature::Gender;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn json_round_trip_and_file_loading() {
        let json = serde_json::to_string_pretty(&RuleSet::default()).unwrap();
        assert!(json.contains("\"HIGH\""));
        assert!(json.contains("\"greater_than\""));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        let loaded = RuleSet::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, RuleSet::default());
    }

    #[test]
    fn thresholds_default_when_omitted() {
        let mut value = serde_json::to_value(RuleSet::default()).unwrap();
        value.as_object_mut().unwrap().remove("thresholds");
        let loaded = RuleSet::from_json_str(&value.to_string()).unwrap();
        assert_eq!(loaded.thresholds, TierThresholds::default());
    }

    #[test]
    fn invalid_json_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = RuleSet::from_json_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }
}

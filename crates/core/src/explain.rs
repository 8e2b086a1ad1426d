//! Human-readable rendering of per-feature attributions.
//!
//! Attributions come from an external explainer. They only affect display and the
//! `is_top_factor` flag on insights, never which actions are recommended or their order.

use crate::domain::features::{Feature, FeatureSnapshot};
use serde::{Deserialize, Serialize};

/// How many attributions are called out as top factors.
pub const DEFAULT_TOP_FACTORS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature: String,
    /// Signed contribution towards churn; positive raises risk.
    pub contribution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactDirection {
    Increases,
    Decreases,
}

impl ImpactDirection {
    fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Self::Increases
        } else {
            Self::Decreases
        }
    }

    pub fn sign(self) -> char {
        match self {
            Self::Increases => '+',
            Self::Decreases => '-',
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Increases => "increases",
            Self::Decreases => "decreases",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainedFactor {
    pub feature: String,
    pub display_name: String,
    pub contribution: f64,
    pub direction: ImpactDirection,
    pub value: Option<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// All factors, strongest absolute contribution first.
    pub factors: Vec<ExplainedFactor>,
    /// One line per top factor, e.g. `Login Frequency (3 logins/month) increases churn risk (+12.0%)`.
    pub summary: Vec<String>,
}

impl Explanation {
    pub fn top_factors(&self) -> &[ExplainedFactor] {
        &self.factors[..self.summary.len().min(self.factors.len())]
    }
}

/// Ranks attributions by absolute contribution (ties keep input order) and renders them.
pub fn explain(
    attributions: &[FeatureAttribution],
    snapshot: Option<&FeatureSnapshot>,
    top_n: usize,
) -> Explanation {
    let mut factors: Vec<ExplainedFactor> = attributions
        .iter()
        .map(|a| explain_one(a, snapshot))
        .collect();
    factors.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

    let summary = factors
        .iter()
        .take(top_n)
        .map(|f| {
            format!(
                "{} ({}{:.1}%)",
                f.explanation,
                f.direction.sign(),
                f.contribution.abs() * 100.0
            )
        })
        .collect();

    Explanation { factors, summary }
}

/// Known features among the `n` strongest attributions, strongest first.
pub fn top_features(attributions: &[FeatureAttribution], n: usize) -> Vec<Feature> {
    let mut ranked: Vec<&FeatureAttribution> = attributions.iter().collect();
    ranked.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    ranked
        .into_iter()
        .take(n)
        .filter_map(|a| Feature::from_name(&a.feature))
        .collect()
}

fn explain_one(attribution: &FeatureAttribution, snapshot: Option<&FeatureSnapshot>) -> ExplainedFactor {
    let feature = Feature::from_name(&attribution.feature);
    let display_name = feature
        .map(|f| f.display_name().to_string())
        .unwrap_or_else(|| attribution.feature.clone());

    let value = match (feature, snapshot) {
        (Some(f), Some(s)) => Some(render_value(f, s)),
        _ => None,
    };

    let direction = ImpactDirection::of(attribution.contribution);
    let explanation = match &value {
        Some(v) => format!("{display_name} ({v}) {} churn risk", direction.verb()),
        None => format!("{display_name} {} churn risk", direction.verb()),
    };

    ExplainedFactor {
        feature: attribution.feature.clone(),
        display_name,
        contribution: attribution.contribution,
        direction,
        value,
        explanation,
    }
}

fn render_value(feature: Feature, snapshot: &FeatureSnapshot) -> String {
    let raw = snapshot.value(feature).to_string();
    match feature.unit() {
        Some("$") => format!("${raw}"),
        Some(unit) => format!("{raw} {unit}"),
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::tests::high_risk_map;

    fn attr(feature: &str, contribution: f64) -> FeatureAttribution {
        FeatureAttribution {
            feature: feature.to_string(),
            contribution,
        }
    }

    #[test]
    fn orders_by_absolute_contribution() {
        let attributions = vec![
            attr("watch_time", 0.05),
            attr("tenure_in_months", -0.30),
            attr("last_login_days", 0.25),
        ];
        let e = explain(&attributions, None, DEFAULT_TOP_FACTORS);
        let order: Vec<_> = e.factors.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, ["tenure_in_months", "last_login_days", "watch_time"]);
        assert_eq!(e.factors[0].direction, ImpactDirection::Decreases);
    }

    #[test]
    fn renders_values_and_units_from_snapshot() {
        let snapshot = FeatureSnapshot::from_map(&high_risk_map()).unwrap();
        let attributions = vec![attr("login_frequency", 0.12), attr("monthly_charges", -0.02)];
        let e = explain(&attributions, Some(&snapshot), DEFAULT_TOP_FACTORS);
        assert_eq!(
            e.summary[0],
            "Login Frequency (3 logins/month) increases churn risk (+12.0%)"
        );
        assert_eq!(
            e.summary[1],
            "Monthly Charges ($12.99) decreases churn risk (-2.0%)"
        );
    }

    #[test]
    fn summary_is_limited_to_top_n() {
        let attributions = vec![
            attr("age", 0.01),
            attr("watch_time", 0.02),
            attr("payment_failures", 0.03),
            attr("gender", 0.04),
        ];
        let e = explain(&attributions, None, 2);
        assert_eq!(e.factors.len(), 4);
        assert_eq!(e.summary.len(), 2);
        assert_eq!(e.top_factors().len(), 2);
        assert_eq!(e.top_factors()[0].feature, "gender");
    }

    #[test]
    fn unknown_features_are_shown_verbatim() {
        let e = explain(&[attr("region_code", 0.2)], None, 3);
        assert_eq!(e.factors[0].display_name, "region_code");
        assert_eq!(e.summary[0], "region_code increases churn risk (+20.0%)");
    }

    #[test]
    fn top_features_skips_unknown_names() {
        let attributions = vec![
            attr("region_code", 0.9),
            attr("payment_failures", 0.18),
            attr("last_login_days", 0.25),
            attr("age", 0.01),
        ];
        assert_eq!(
            top_features(&attributions, 3),
            vec![Feature::LastLoginDays, Feature::PaymentFailures]
        );
    }
}

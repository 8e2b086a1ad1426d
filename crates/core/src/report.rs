use crate::domain::recommendation::RecommendationReport;
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

/// Renders a report as the plain-text block shown to operators.
pub fn format_report(report: &RecommendationReport, customer_id: Option<&str>) -> String {
    let banner = "=".repeat(RULE_WIDTH);
    let divider = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{banner}");
    match customer_id {
        Some(id) => {
            let _ = writeln!(out, "ACTION RECOMMENDATION REPORT - customer {id}");
        }
        None => {
            let _ = writeln!(out, "ACTION RECOMMENDATION REPORT");
        }
    }
    let _ = writeln!(out, "{banner}");

    let _ = writeln!(out, "\n{}", report.status);
    let _ = writeln!(out, "\nRisk Level: {}", report.tier);
    let _ = writeln!(out, "Urgency: {}", report.urgency);
    let _ = writeln!(out, "Churn Probability: {:.1}%", report.probability * 100.0);
    let _ = writeln!(out, "Prediction: {}", report.predicted_label.as_str());

    let _ = writeln!(out, "\n{divider}");
    let _ = writeln!(out, "PRIMARY ACTION:");
    let _ = writeln!(out, "  >> {}", report.primary_action);
    let _ = writeln!(out, "  ({})", report.headline);

    let _ = writeln!(out, "\n{divider}");
    let _ = writeln!(out, "RECOMMENDED ACTIONS:");
    for (i, action) in report.recommended_actions.iter().enumerate() {
        let _ = writeln!(out, "  {}. {action}", i + 1);
    }

    if !report.factor_insights.is_empty() {
        let _ = writeln!(out, "\n{divider}");
        let _ = writeln!(out, "FACTOR-SPECIFIC INSIGHTS:");
        for insight in &report.factor_insights {
            let marker = if insight.is_top_factor {
                " [TOP FACTOR]"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "\n  {} = {}{marker}",
                insight.feature.as_str().to_uppercase(),
                insight.value
            );
            let _ = writeln!(out, "    Reason: {}", insight.reason);
            let _ = writeln!(out, "    Action: {}", insight.action);
        }
    }

    if let Some(explanation) = &report.explanation {
        if !explanation.summary.is_empty() {
            let _ = writeln!(out, "\n{divider}");
            let _ = writeln!(out, "TOP FACTORS INFLUENCING CHURN:");
            for (i, line) in explanation.summary.iter().enumerate() {
                let _ = writeln!(out, "  {}. {line}", i + 1);
            }
        }
    }

    let _ = write!(out, "\n{banner}");
    out
}

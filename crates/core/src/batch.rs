use crate::domain::contract::EvaluationRequest;
use crate::domain::error::EvaluationError;
use crate::domain::recommendation::RecommendationReport;
use crate::domain::risk::{PredictedLabel, RiskTier};
use crate::engine::RecommendationEngine;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_RECORDS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on records per batch.
    pub max_records: usize,

    /// Abort on the first invalid record instead of skipping it.
    pub fail_fast: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            fail_fast: false,
        }
    }
}

impl BatchOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("BATCH_MAX_RECORDS") {
            if let Ok(n) = s.parse::<usize>() {
                out.max_records = n;
            }
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&EvaluationError> for BatchError {
    fn from(err: &EvaluationError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            field: err.field().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Zero-based position in the input.
    pub index: usize,
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<RecommendationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
}

/// Risk mix of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub churn_predicted: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
}

impl BatchSummary {
    pub fn record(&mut self, report: &RecommendationReport) {
        self.total += 1;
        self.evaluated += 1;
        if report.predicted_label == PredictedLabel::Churn {
            self.churn_predicted += 1;
        }
        match report.tier {
            RiskTier::High => self.high += 1,
            RiskTier::Moderate => self.moderate += 1,
            RiskTier::Low => self.low += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    pub fn count(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::High => self.high,
            RiskTier::Moderate => self.moderate,
            RiskTier::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
}

impl BatchResult {
    /// Keeps only successfully evaluated entries in `tier`. The summary still describes the whole batch.
    pub fn retain_tier(&mut self, tier: RiskTier) {
        self.entries
            .retain(|e| e.report.as_ref().is_some_and(|r| r.tier == tier));
    }
}

/// Evaluates every record independently.
///
/// Records are raw JSON so that one malformed record fails alone. Input errors are
/// recorded per entry (or abort the batch with `fail_fast`); internal consistency faults
/// such as `UnknownTier` always abort.
pub fn evaluate_batch(
    engine: &RecommendationEngine,
    records: Vec<serde_json::Value>,
    opts: &BatchOptions,
) -> anyhow::Result<BatchResult> {
    anyhow::ensure!(
        records.len() <= opts.max_records,
        "batch has {} records (max {})",
        records.len(),
        opts.max_records
    );

    let mut entries = Vec::with_capacity(records.len());
    let mut summary = BatchSummary::default();

    for (index, record) in records.into_iter().enumerate() {
        let customer_id = record
            .get("customer_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let outcome = EvaluationRequest::from_value(record)
            .and_then(EvaluationRequest::validate_and_into_input)
            .and_then(|input| engine.evaluate(&input));

        match outcome {
            Ok(report) => {
                summary.record(&report);
                entries.push(BatchEntry {
                    index,
                    customer_id,
                    report: Some(report),
                    error: None,
                });
            }
            Err(err) if err.is_input_error() && !opts.fail_fast => {
                tracing::warn!(index, customer_id = ?customer_id, error = %err, "skipping invalid record");
                summary.record_failure();
                entries.push(BatchEntry {
                    index,
                    customer_id,
                    report: None,
                    error: Some(BatchError::from(&err)),
                });
            }
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!("record {index} failed")));
            }
        }
    }

    tracing::info!(
        total = summary.total,
        failed = summary.failed,
        high = summary.high,
        moderate = summary.moderate,
        low = summary.low,
        "batch evaluated"
    );

    Ok(BatchResult { entries, summary })
}

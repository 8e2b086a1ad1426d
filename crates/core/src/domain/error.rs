use std::fmt;

/// Failures of the classification/recommendation core.
///
/// Every variant is an input or consistency fault; nothing here is transient, so callers
/// should surface these rather than retry.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The record does not have the evaluation request shape at all.
    InvalidRequest { detail: String },
    /// Probability outside `[0, 1]` (or NaN).
    InvalidProbability { value: f64 },
    /// A required feature is absent from the snapshot.
    MissingFeature { field: String },
    /// A feature is present but unusable (unknown name, wrong kind, not finite).
    InvalidFeature { field: String, detail: String },
    /// The rule table has no policy for a tier. Unreachable with a validated rule table.
    UnknownTier { tier: String },
    /// The rule table itself is inconsistent.
    InvalidRules { detail: String },
}

impl EvaluationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidProbability { .. } => "invalid_probability",
            Self::MissingFeature { .. } => "missing_feature",
            Self::InvalidFeature { .. } => "invalid_feature",
            Self::UnknownTier { .. } => "unknown_tier",
            Self::InvalidRules { .. } => "invalid_rules",
        }
    }

    /// Field name for feature-level errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingFeature { field } | Self::InvalidFeature { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Caller-side faults, as opposed to internal consistency faults.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidProbability { .. }
                | Self::MissingFeature { .. }
                | Self::InvalidFeature { .. }
        )
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest { detail } => write!(f, "malformed evaluation request: {detail}"),
            Self::InvalidProbability { value } => {
                write!(f, "churn probability must be within [0, 1] (got {value})")
            }
            Self::MissingFeature { field } => write!(f, "missing required feature: {field}"),
            Self::InvalidFeature { field, detail } => {
                write!(f, "invalid feature {field}: {detail}")
            }
            Self::UnknownTier { tier } => {
                write!(f, "no rule policy configured for risk tier {tier}")
            }
            Self::InvalidRules { detail } => write!(f, "invalid rule table: {detail}"),
        }
    }
}

impl std::error::Error for EvaluationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_feature_names_the_field() {
        let err = EvaluationError::MissingFeature {
            field: "payment_failures".to_string(),
        };
        assert_eq!(err.field(), Some("payment_failures"));
        assert_eq!(err.kind(), "missing_feature");
        assert!(err.to_string().contains("payment_failures"));
        assert!(err.is_input_error());
    }

    #[test]
    fn malformed_request_is_an_input_error() {
        let err = EvaluationError::InvalidRequest {
            detail: "missing field `churn_probability`".to_string(),
        };
        assert_eq!(err.kind(), "invalid_request");
        assert!(err.is_input_error());
        assert_eq!(err.field(), None);
    }

    #[test]
    fn unknown_tier_is_not_an_input_error() {
        let err = EvaluationError::UnknownTier {
            tier: "HIGH".to_string(),
        };
        assert!(!err.is_input_error());
        assert_eq!(err.field(), None);
    }

    #[test]
    fn survives_anyhow_downcast() {
        let err = anyhow::Error::new(EvaluationError::InvalidProbability { value: 1.5 });
        let inner = err.downcast_ref::<EvaluationError>().unwrap();
        assert_eq!(inner.kind(), "invalid_probability");
    }
}

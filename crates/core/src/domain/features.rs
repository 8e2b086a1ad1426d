use crate::domain::error::EvaluationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The fixed set of customer fields every snapshot must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Age,
    Gender,
    SubscriptionType,
    MonthlyCharges,
    TenureInMonths,
    LoginFrequency,
    LastLoginDays,
    WatchTime,
    PaymentFailures,
    CustomerSupportCalls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Age,
        Feature::Gender,
        Feature::SubscriptionType,
        Feature::MonthlyCharges,
        Feature::TenureInMonths,
        Feature::LoginFrequency,
        Feature::LastLoginDays,
        Feature::WatchTime,
        Feature::PaymentFailures,
        Feature::CustomerSupportCalls,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gender => "gender",
            Self::SubscriptionType => "subscription_type",
            Self::MonthlyCharges => "monthly_charges",
            Self::TenureInMonths => "tenure_in_months",
            Self::LoginFrequency => "login_frequency",
            Self::LastLoginDays => "last_login_days",
            Self::WatchTime => "watch_time",
            Self::PaymentFailures => "payment_failures",
            Self::CustomerSupportCalls => "customer_support_calls",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name.trim())
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Age => "Age",
            Self::Gender => "Gender",
            Self::SubscriptionType => "Subscription Type",
            Self::MonthlyCharges => "Monthly Charges",
            Self::TenureInMonths => "Account Tenure",
            Self::LoginFrequency => "Login Frequency",
            Self::LastLoginDays => "Days Since Last Login",
            Self::WatchTime => "Watch Time",
            Self::PaymentFailures => "Payment Failures",
            Self::CustomerSupportCalls => "Support Calls",
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::Age => Some("years"),
            Self::MonthlyCharges => Some("$"),
            Self::TenureInMonths => Some("months"),
            Self::LoginFrequency => Some("logins/month"),
            Self::LastLoginDays => Some("days"),
            Self::WatchTime => Some("hours/month"),
            Self::PaymentFailures => Some("failures"),
            Self::CustomerSupportCalls => Some("calls"),
            Self::Gender | Self::SubscriptionType => None,
        }
    }

    pub fn kind(self) -> FeatureKind {
        match self {
            Self::Gender | Self::SubscriptionType => FeatureKind::Categorical,
            _ => FeatureKind::Numeric,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionType {
    Basic,
    Standard,
    Premium,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

impl SubscriptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Standard => "Standard",
            Self::Premium => "Premium",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "standard" => Some(Self::Standard),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

/// Raw value as supplied by the data layer. `Null` counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Null,
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Formats whole numbers without a trailing `.0` (`45`, `2.5`, `12.99`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Validated, immutable feature values for one customer at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSnapshot {
    pub age: f64,
    pub gender: Gender,
    pub subscription_type: SubscriptionType,
    pub monthly_charges: f64,
    pub tenure_in_months: f64,
    pub login_frequency: f64,
    pub last_login_days: f64,
    pub watch_time: f64,
    pub payment_failures: f64,
    pub customer_support_calls: f64,
}

impl FeatureSnapshot {
    /// Builds a snapshot from named values.
    ///
    /// Every field in [`Feature::ALL`] is required; the first absent or `null` one (in that
    /// order) is reported as `MissingFeature`. Only once all fields are present are unknown
    /// names and wrongly-typed values rejected.
    pub fn from_map(values: &BTreeMap<String, FeatureValue>) -> Result<Self, EvaluationError> {
        let lookup = |feature: Feature| -> Result<&FeatureValue, EvaluationError> {
            values
                .iter()
                .find(|(k, v)| k.trim() == feature.as_str() && **v != FeatureValue::Null)
                .map(|(_, v)| v)
                .ok_or_else(|| EvaluationError::MissingFeature {
                    field: feature.as_str().to_string(),
                })
        };

        for feature in Feature::ALL {
            lookup(feature)?;
        }

        for name in values.keys() {
            if Feature::from_name(name).is_none() {
                return Err(EvaluationError::InvalidFeature {
                    field: name.clone(),
                    detail: "unknown feature name".to_string(),
                });
            }
        }

        let number = |feature: Feature| -> Result<f64, EvaluationError> {
            match lookup(feature)? {
                FeatureValue::Number(n) if n.is_finite() && *n >= 0.0 => Ok(*n),
                FeatureValue::Number(n) => Err(EvaluationError::InvalidFeature {
                    field: feature.as_str().to_string(),
                    detail: format!("must be a finite non-negative number (got {n})"),
                }),
                FeatureValue::Text(s) => Err(EvaluationError::InvalidFeature {
                    field: feature.as_str().to_string(),
                    detail: format!("expected a number (got {s:?})"),
                }),
                FeatureValue::Null => Err(EvaluationError::MissingFeature {
                    field: feature.as_str().to_string(),
                }),
            }
        };

        let text = |feature: Feature| -> Result<&str, EvaluationError> {
            match lookup(feature)? {
                FeatureValue::Text(s) => Ok(s.as_str()),
                FeatureValue::Number(n) => Err(EvaluationError::InvalidFeature {
                    field: feature.as_str().to_string(),
                    detail: format!("expected a category label (got {n})"),
                }),
                FeatureValue::Null => Err(EvaluationError::MissingFeature {
                    field: feature.as_str().to_string(),
                }),
            }
        };

        let age = number(Feature::Age)?;
        let gender_raw = text(Feature::Gender)?;
        let gender = Gender::parse(gender_raw).ok_or_else(|| EvaluationError::InvalidFeature {
            field: Feature::Gender.as_str().to_string(),
            detail: format!("unknown gender {gender_raw:?}"),
        })?;
        let subscription_raw = text(Feature::SubscriptionType)?;
        let subscription_type =
            SubscriptionType::parse(subscription_raw).ok_or_else(|| {
                EvaluationError::InvalidFeature {
                    field: Feature::SubscriptionType.as_str().to_string(),
                    detail: format!("unknown subscription type {subscription_raw:?}"),
                }
            })?;

        Ok(Self {
            age,
            gender,
            subscription_type,
            monthly_charges: number(Feature::MonthlyCharges)?,
            tenure_in_months: number(Feature::TenureInMonths)?,
            login_frequency: number(Feature::LoginFrequency)?,
            last_login_days: number(Feature::LastLoginDays)?,
            watch_time: number(Feature::WatchTime)?,
            payment_failures: number(Feature::PaymentFailures)?,
            customer_support_calls: number(Feature::CustomerSupportCalls)?,
        })
    }

    /// Numeric value of a feature; `None` for categorical features.
    pub fn numeric(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Age => Some(self.age),
            Feature::MonthlyCharges => Some(self.monthly_charges),
            Feature::TenureInMonths => Some(self.tenure_in_months),
            Feature::LoginFrequency => Some(self.login_frequency),
            Feature::LastLoginDays => Some(self.last_login_days),
            Feature::WatchTime => Some(self.watch_time),
            Feature::PaymentFailures => Some(self.payment_failures),
            Feature::CustomerSupportCalls => Some(self.customer_support_calls),
            Feature::Gender | Feature::SubscriptionType => None,
        }
    }

    pub fn value(&self, feature: Feature) -> FeatureValue {
        match feature {
            Feature::Gender => FeatureValue::Text(self.gender.as_str().to_string()),
            Feature::SubscriptionType => {
                FeatureValue::Text(self.subscription_type.as_str().to_string())
            }
            other => FeatureValue::Number(self.numeric(other).unwrap_or_default()),
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, FeatureValue> {
        Feature::ALL
            .into_iter()
            .map(|f| (f.as_str().to_string(), self.value(f)))
            .collect()
    }
}

impl<'de> Deserialize<'de> for FeatureSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, FeatureValue>::deserialize(deserializer)?;
        Self::from_map(&raw).map_err(serde::de::Error::custom)
    }
}

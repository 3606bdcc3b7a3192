//! Risk rules
//!
//! A rule is a named, pure mapping from a [`Transaction`] to a point
//! contribution. Rules never look at each other, so a catalog score is simply
//! the sum of its rules.

use crate::weights::RiskWeights;
use crate::{DeviceType, ScoringError, Transaction};
use chrono::{DateTime, Datelike, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// What a rule looks at and how many points it adds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Fires when `above < amount <= up_to` (no upper bound when `up_to` is absent)
    AmountBand {
        above: f64,
        #[serde(default)]
        up_to: Option<f64>,
        points: u32,
    },
    /// Merchant base risk scaled into points, firing when the product exceeds `above`
    MerchantCategory { scale: f64, above: f64 },
    /// Time-of-day base risk scaled into points, firing when the product exceeds `above`
    TimeOfDay { scale: f64, above: f64 },
    CardNotPresent { points: u32 },
    UnknownDevice { points: u32 },
    /// Fires when `above < recent count <= up_to`
    VelocityBand {
        above: u32,
        #[serde(default)]
        up_to: Option<u32>,
        points: u32,
    },
    /// Adds `points_per_transaction` for every recent transaction
    VelocityLinear { points_per_transaction: u32 },
    /// Case-insensitive regular expression searched for in the location text
    LocationPattern { pattern: String, points: u32 },
    /// CVV length is neither 3 nor 4
    InvalidCvv { points: u32 },
    /// Card number length outside 13-19 once whitespace is removed
    InvalidCardNumber { points: u32 },
    /// Expiry (year, month) earlier than the evaluation month
    ExpiredCard { points: u32 },
}

/// Named risk rule
///
/// `description` overrides the factor text reported when the rule fires. It
/// may reference `{amount}`, `{count}`, `{label}` and `{match}`, which are
/// replaced with the formatted amount, the recent-transaction count, the
/// merchant or time-of-day label and the matched location text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Points a rule adds for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contribution {
    pub impact: u32,
    pub description: Option<String>,
}

impl Contribution {
    fn none() -> Self {
        Self::default()
    }

    fn fired(impact: u32, description: String) -> Self {
        if impact == 0 {
            return Self::none();
        }
        Self {
            impact,
            description: Some(description),
        }
    }

    /// Whether the rule added any points
    pub fn is_fired(&self) -> bool {
        self.impact > 0
    }
}

/// Rule that fired on a transaction, as reported in a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    pub rule: String,
    pub impact: u32,
    pub description: String,
}

impl Rule {
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the rule and prepare it for evaluation
    pub fn compile(&self) -> Result<CompiledRule, ScoringError> {
        if self.name.trim().is_empty() {
            return Err(ScoringError::InvalidConfiguration(
                "rule name must not be empty".to_string(),
            ));
        }

        let invalid = |reason: String| {
            Err(ScoringError::InvalidConfiguration(format!(
                "rule '{}': {}",
                self.name, reason
            )))
        };

        let mut location_pattern = None;
        match &self.kind {
            RuleKind::AmountBand { above, up_to, .. } => {
                if !above.is_finite() || *above < 0.0 {
                    return invalid(format!("lower bound {} must be non-negative", above));
                }
                if let Some(max) = up_to {
                    if !max.is_finite() || max <= above {
                        return invalid(format!("upper bound {} must exceed {}", max, above));
                    }
                }
            }
            RuleKind::MerchantCategory { scale, above } | RuleKind::TimeOfDay { scale, above } => {
                if !scale.is_finite() || *scale < 0.0 {
                    return invalid(format!("scale {} must be non-negative", scale));
                }
                if !above.is_finite() || *above < 0.0 {
                    return invalid(format!("threshold {} must be non-negative", above));
                }
            }
            RuleKind::VelocityBand { above, up_to, .. } => {
                if let Some(max) = up_to {
                    if max <= above {
                        return invalid(format!("upper bound {} must exceed {}", max, above));
                    }
                }
            }
            RuleKind::LocationPattern { pattern, .. } => {
                if pattern.trim().is_empty() {
                    return invalid("location pattern must not be empty".to_string());
                }
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => location_pattern = Some(regex),
                    Err(e) => return invalid(format!("invalid location pattern: {}", e)),
                }
            }
            RuleKind::CardNotPresent { .. }
            | RuleKind::UnknownDevice { .. }
            | RuleKind::VelocityLinear { .. }
            | RuleKind::InvalidCvv { .. }
            | RuleKind::InvalidCardNumber { .. }
            | RuleKind::ExpiredCard { .. } => {}
        }

        Ok(CompiledRule {
            rule: self.clone(),
            location_pattern,
        })
    }
}

/// Validated rule ready to be applied
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    location_pattern: Option<Regex>,
}

impl CompiledRule {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    // Configured text wins over the built-in wording
    fn describe(&self, default: String, values: &[(&str, String)]) -> String {
        match &self.rule.description {
            Some(template) => values
                .iter()
                .fold(template.clone(), |text, (key, value)| text.replace(key, value)),
            None => default,
        }
    }

    /// Apply the rule to a transaction evaluated at `as_of`
    pub fn apply(
        &self,
        transaction: &Transaction,
        weights: &RiskWeights,
        as_of: &DateTime<Utc>,
    ) -> Contribution {
        match &self.rule.kind {
            RuleKind::AmountBand {
                above,
                up_to,
                points,
            } => {
                let amount = transaction.effective_amount();
                if amount > *above && up_to.map_or(true, |max| amount <= max) {
                    let default =
                        format!("${:.2} exceeds the ${:.2} spending level", amount, above);
                    Contribution::fired(
                        *points,
                        self.describe(default, &[("{amount}", format!("${:.2}", amount))]),
                    )
                } else {
                    Contribution::none()
                }
            }
            RuleKind::MerchantCategory { scale, above } => {
                let category = transaction.merchant_category;
                let score = weights.merchant_risk(category) * scale;
                if score > *above {
                    let label = category.label();
                    Contribution::fired(
                        round_points(score),
                        self.describe(
                            format!("{} has elevated fraud risk", label),
                            &[("{label}", label.to_string())],
                        ),
                    )
                } else {
                    Contribution::none()
                }
            }
            RuleKind::TimeOfDay { scale, above } => {
                let bucket = transaction.time_of_day;
                let score = weights.time_risk(bucket) * scale;
                if score > *above {
                    let label = bucket.label();
                    Contribution::fired(
                        round_points(score),
                        self.describe(
                            format!("{} transactions have higher risk", label),
                            &[("{label}", label.to_string())],
                        ),
                    )
                } else {
                    Contribution::none()
                }
            }
            RuleKind::CardNotPresent { points } => {
                if transaction.card_present {
                    Contribution::none()
                } else {
                    Contribution::fired(
                        *points,
                        self.describe(
                            "Online/phone transactions have higher fraud risk".to_string(),
                            &[],
                        ),
                    )
                }
            }
            RuleKind::UnknownDevice { points } => {
                if transaction.device_type == DeviceType::Unknown {
                    Contribution::fired(
                        *points,
                        self.describe("Unrecognized device increases risk".to_string(), &[]),
                    )
                } else {
                    Contribution::none()
                }
            }
            RuleKind::VelocityBand {
                above,
                up_to,
                points,
            } => {
                let count = transaction.recent_transactions;
                if count > *above && up_to.map_or(true, |max| count <= max) {
                    Contribution::fired(
                        *points,
                        self.describe(
                            format!("{} transactions in the past hour", count),
                            &[("{count}", count.to_string())],
                        ),
                    )
                } else {
                    Contribution::none()
                }
            }
            RuleKind::VelocityLinear {
                points_per_transaction,
            } => {
                let count = transaction.recent_transactions;
                Contribution::fired(
                    count.saturating_mul(*points_per_transaction),
                    self.describe(
                        format!("{} recent transactions detected", count),
                        &[("{count}", count.to_string())],
                    ),
                )
            }
            RuleKind::LocationPattern { points, .. } => {
                let matched = self
                    .location_pattern
                    .as_ref()
                    .and_then(|pattern| pattern.find(&transaction.location));
                match matched {
                    Some(m) => {
                        let text = m.as_str().to_lowercase();
                        Contribution::fired(
                            *points,
                            self.describe(
                                format!("Location flagged as {}", text),
                                &[("{match}", text.clone())],
                            ),
                        )
                    }
                    None => Contribution::none(),
                }
            }
            RuleKind::InvalidCvv { points } => {
                let length = transaction.cvv.chars().count();
                if length == 3 || length == 4 {
                    Contribution::none()
                } else {
                    Contribution::fired(
                        *points,
                        self.describe("CVV does not match expected format".to_string(), &[]),
                    )
                }
            }
            RuleKind::InvalidCardNumber { points } => {
                let length = transaction.normalized_card_number().chars().count();
                if (13..=19).contains(&length) {
                    Contribution::none()
                } else {
                    Contribution::fired(
                        *points,
                        self.describe("Card number format appears invalid".to_string(), &[]),
                    )
                }
            }
            RuleKind::ExpiredCard { points } => {
                let expiry = (transaction.expiry_year, transaction.expiry_month);
                if expiry < (as_of.year(), as_of.month()) {
                    Contribution::fired(
                        *points,
                        self.describe("Card expiry date has passed".to_string(), &[]),
                    )
                } else {
                    Contribution::none()
                }
            }
        }
    }
}

fn round_points(score: f64) -> u32 {
    // Bounded by weight (<= 1) times a finite scale
    score.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MerchantCategory, TimeOfDay};
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn create_test_transaction() -> Transaction {
        Transaction {
            amount: 100.0,
            merchant_category: MerchantCategory::Retail,
            time_of_day: TimeOfDay::Business,
            card_present: true,
            device_type: DeviceType::Mobile,
            recent_transactions: 1,
            location: "Chicago, IL".to_string(),
            cvv: "123".to_string(),
            card_number: "4532 0151 1283 0366".to_string(),
            expiry_month: 12,
            expiry_year: 2027,
        }
    }

    fn apply(kind: RuleKind, transaction: &Transaction) -> Contribution {
        Rule::new("test rule", kind)
            .compile()
            .unwrap()
            .apply(transaction, &RiskWeights::detailed(), &as_of())
    }

    #[test]
    fn test_amount_band_bounds() {
        let band = RuleKind::AmountBand {
            above: 1000.0,
            up_to: Some(5000.0),
            points: 15,
        };
        let mut txn = create_test_transaction();

        txn.amount = 1000.0;
        assert!(!apply(band.clone(), &txn).is_fired());

        txn.amount = 1000.01;
        assert_eq!(apply(band.clone(), &txn).impact, 15);

        txn.amount = 5000.0;
        assert_eq!(apply(band.clone(), &txn).impact, 15);

        txn.amount = 5000.01;
        assert!(!apply(band, &txn).is_fired());
    }

    #[test]
    fn test_amount_band_description() {
        let mut txn = create_test_transaction();
        txn.amount = 6000.0;
        let contribution = apply(
            RuleKind::AmountBand {
                above: 5000.0,
                up_to: None,
                points: 25,
            },
            &txn,
        );
        assert_eq!(
            contribution.description.as_deref(),
            Some("$6000.00 exceeds the $5000.00 spending level")
        );
    }

    #[test]
    fn test_merchant_category_scaling() {
        let rule = RuleKind::MerchantCategory {
            scale: 30.0,
            above: 15.0,
        };
        let mut txn = create_test_transaction();

        // retail: 0.1 * 30 = 3, below threshold
        assert!(!apply(rule.clone(), &txn).is_fired());

        txn.merchant_category = MerchantCategory::Gambling;
        let contribution = apply(rule.clone(), &txn);
        assert_eq!(contribution.impact, 24);
        assert_eq!(
            contribution.description.as_deref(),
            Some("Gambling has elevated fraud risk")
        );

        txn.merchant_category = MerchantCategory::Crypto;
        assert_eq!(apply(rule, &txn).impact, 18);
    }

    #[test]
    fn test_time_of_day_scaling() {
        let rule = RuleKind::TimeOfDay {
            scale: 20.0,
            above: 5.0,
        };
        let mut txn = create_test_transaction();

        txn.time_of_day = TimeOfDay::Evening;
        assert!(!apply(rule.clone(), &txn).is_fired());

        txn.time_of_day = TimeOfDay::EarlyMorning;
        assert_eq!(apply(rule.clone(), &txn).impact, 6);

        txn.time_of_day = TimeOfDay::LateNight;
        assert_eq!(apply(rule, &txn).impact, 10);
    }

    #[test]
    fn test_card_not_present() {
        let mut txn = create_test_transaction();
        assert!(!apply(RuleKind::CardNotPresent { points: 20 }, &txn).is_fired());

        txn.card_present = false;
        assert_eq!(apply(RuleKind::CardNotPresent { points: 20 }, &txn).impact, 20);
    }

    #[test]
    fn test_unknown_device() {
        let mut txn = create_test_transaction();
        txn.device_type = DeviceType::Pos;
        assert!(!apply(RuleKind::UnknownDevice { points: 15 }, &txn).is_fired());

        txn.device_type = DeviceType::Unknown;
        assert_eq!(apply(RuleKind::UnknownDevice { points: 15 }, &txn).impact, 15);
    }

    #[test]
    fn test_velocity_band() {
        let elevated = RuleKind::VelocityBand {
            above: 3,
            up_to: Some(5),
            points: 10,
        };
        let mut txn = create_test_transaction();

        txn.recent_transactions = 3;
        assert!(!apply(elevated.clone(), &txn).is_fired());
        txn.recent_transactions = 4;
        assert_eq!(apply(elevated.clone(), &txn).impact, 10);
        txn.recent_transactions = 6;
        assert!(!apply(elevated, &txn).is_fired());
    }

    #[test]
    fn test_velocity_linear() {
        let mut txn = create_test_transaction();
        txn.recent_transactions = 4;
        let contribution = apply(
            RuleKind::VelocityLinear {
                points_per_transaction: 5,
            },
            &txn,
        );
        assert_eq!(contribution.impact, 20);

        txn.recent_transactions = 0;
        let contribution = apply(
            RuleKind::VelocityLinear {
                points_per_transaction: 5,
            },
            &txn,
        );
        assert!(!contribution.is_fired());
        assert!(contribution.description.is_none());
    }

    #[test]
    fn test_location_pattern_case_insensitive() {
        let rule = RuleKind::LocationPattern {
            pattern: "international|foreign".to_string(),
            points: 15,
        };
        let mut txn = create_test_transaction();
        assert!(!apply(rule.clone(), &txn).is_fired());

        txn.location = "London (International)".to_string();
        assert_eq!(apply(rule.clone(), &txn).impact, 15);

        txn.location = "FOREIGN merchant".to_string();
        let contribution = apply(rule, &txn);
        assert_eq!(
            contribution.description.as_deref(),
            Some("Location flagged as foreign")
        );
    }

    #[test]
    fn test_invalid_cvv() {
        let mut txn = create_test_transaction();
        for cvv in ["123", "1234"] {
            txn.cvv = cvv.to_string();
            assert!(!apply(RuleKind::InvalidCvv { points: 10 }, &txn).is_fired());
        }
        for cvv in ["", "12", "12345"] {
            txn.cvv = cvv.to_string();
            assert_eq!(apply(RuleKind::InvalidCvv { points: 10 }, &txn).impact, 10);
        }
    }

    #[test]
    fn test_invalid_card_number() {
        let mut txn = create_test_transaction();
        assert!(!apply(RuleKind::InvalidCardNumber { points: 15 }, &txn).is_fired());

        txn.card_number = "123".to_string();
        assert_eq!(apply(RuleKind::InvalidCardNumber { points: 15 }, &txn).impact, 15);

        txn.card_number = "1234 5678 9012 3456 7890".to_string();
        assert_eq!(apply(RuleKind::InvalidCardNumber { points: 15 }, &txn).impact, 15);
    }

    #[test]
    fn test_expired_card() {
        let mut txn = create_test_transaction();

        // Same month as evaluation is still valid
        txn.expiry_year = 2025;
        txn.expiry_month = 6;
        assert!(!apply(RuleKind::ExpiredCard { points: 30 }, &txn).is_fired());

        txn.expiry_month = 5;
        assert_eq!(apply(RuleKind::ExpiredCard { points: 30 }, &txn).impact, 30);

        txn.expiry_year = 2024;
        txn.expiry_month = 12;
        assert_eq!(apply(RuleKind::ExpiredCard { points: 30 }, &txn).impact, 30);
    }

    #[test]
    fn test_zero_point_rule_never_fires() {
        let mut txn = create_test_transaction();
        txn.card_present = false;
        let contribution = apply(RuleKind::CardNotPresent { points: 0 }, &txn);
        assert_eq!(contribution, Contribution::default());
    }

    #[test]
    fn test_compile_rejects_bad_rules() {
        let bad = [
            Rule::new("", RuleKind::CardNotPresent { points: 5 }),
            Rule::new(
                "inverted band",
                RuleKind::AmountBand {
                    above: 500.0,
                    up_to: Some(100.0),
                    points: 5,
                },
            ),
            Rule::new(
                "negative scale",
                RuleKind::MerchantCategory {
                    scale: -30.0,
                    above: 15.0,
                },
            ),
            Rule::new(
                "empty band",
                RuleKind::VelocityBand {
                    above: 5,
                    up_to: Some(5),
                    points: 5,
                },
            ),
            Rule::new(
                "bad pattern",
                RuleKind::LocationPattern {
                    pattern: "(unclosed".to_string(),
                    points: 5,
                },
            ),
        ];

        for rule in bad {
            assert!(matches!(
                rule.compile(),
                Err(ScoringError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_rule_json_shape() {
        let json = r#"{
            "name": "Elevated transaction velocity",
            "kind": "velocity_band",
            "above": 3,
            "up_to": 5,
            "points": 10
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule.kind,
            RuleKind::VelocityBand {
                above: 3,
                up_to: Some(5),
                points: 10
            }
        );

        assert!(rule.description.is_none());

        let json = r#"{
            "name": "High transaction amount",
            "kind": "amount_band",
            "above": 5000,
            "points": 25,
            "description": "{amount} exceeds normal spending"
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule.kind,
            RuleKind::AmountBand {
                above: 5000.0,
                up_to: None,
                points: 25
            }
        );
        assert_eq!(
            rule.description.as_deref(),
            Some("{amount} exceeds normal spending")
        );
    }

    #[test]
    fn test_rule_without_description_omits_field() {
        let rule = Rule::new("Unknown device", RuleKind::UnknownDevice { points: 15 });
        let json = serde_json::to_string(&rule).unwrap();
        assert!(!json.contains("description"));
    }

    #[test]
    fn test_description_template_placeholders() {
        let mut txn = create_test_transaction();
        txn.amount = 6000.0;
        txn.recent_transactions = 6;
        txn.merchant_category = MerchantCategory::Gambling;
        txn.location = "Foreign ATM".to_string();

        let describe = |rule: Rule| {
            rule.compile()
                .unwrap()
                .apply(&txn, &RiskWeights::detailed(), &as_of())
                .description
        };

        let amount = Rule::new(
            "High transaction amount",
            RuleKind::AmountBand {
                above: 5000.0,
                up_to: None,
                points: 25,
            },
        )
        .with_description("{amount} exceeds normal spending");
        assert_eq!(
            describe(amount).as_deref(),
            Some("$6000.00 exceeds normal spending")
        );

        let velocity = Rule::new(
            "High transaction velocity",
            RuleKind::VelocityBand {
                above: 5,
                up_to: None,
                points: 20,
            },
        )
        .with_description("{count} transactions in short timeframe");
        assert_eq!(
            describe(velocity).as_deref(),
            Some("6 transactions in short timeframe")
        );

        let merchant = Rule::new(
            "High-risk merchant category",
            RuleKind::MerchantCategory {
                scale: 30.0,
                above: 15.0,
            },
        )
        .with_description("{label} merchant");
        assert_eq!(describe(merchant).as_deref(), Some("Gambling merchant"));

        let location = Rule::new(
            "International transaction",
            RuleKind::LocationPattern {
                pattern: "international|foreign".to_string(),
                points: 15,
            },
        )
        .with_description("Cross-border transaction detected ({match})");
        assert_eq!(
            describe(location).as_deref(),
            Some("Cross-border transaction detected (foreign)")
        );
    }
}

//! # Card Risk Scorer
//!
//! Explainable risk scoring for proposed payment card transactions.
//!
//! ## Features
//!
//! - **Rule Catalog**: ordered, additive risk rules whose weights are data, not code
//! - **Risk Evaluator**: pure, stateless scoring into four risk tiers with a recommendation
//! - **Explainability**: every verdict lists the rules that fired and their point impact
//! - **Configurable Weights**: merchant and time-of-day base-risk tables loadable from JSON
//! - **Audit Trail**: verdicts carry the fingerprint of the catalog that scored them
//! - **Evaluation History**: bounded most-recent-first session history
//!
//! ## Example
//!
//! ```
//! use card_risk_scorer::{RawTransaction, RiskEvaluator, RiskTier};
//!
//! let evaluator = RiskEvaluator::detailed();
//! let raw = RawTransaction {
//!     card_number: Some("4532 0151 1283 0366".to_string()),
//!     transaction_amount: Some("42.50".to_string()),
//!     expiry_month: Some("12".to_string()),
//!     expiry_year: Some("2099".to_string()),
//!     cvv: Some("123".to_string()),
//!     ..Default::default()
//! };
//!
//! let verdict = evaluator.evaluate_raw(&raw).unwrap();
//! assert_eq!(verdict.tier, RiskTier::Legitimate);
//! ```

pub mod catalog;
pub mod evaluator;
pub mod history;
pub mod rules;
pub mod weights;

pub use catalog::{configure_catalog, CatalogConfig, CatalogHandle, RuleCatalog};
pub use evaluator::{Recommendation, RiskEvaluator, RiskTier, Verdict, MAX_SCORE};
pub use history::{EvaluationHistory, HistoryStats, SharedHistory, DEFAULT_HISTORY_CAPACITY};
pub use rules::{Contribution, Factor, Rule, RuleKind};
pub use weights::RiskWeights;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Scoring errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringError {
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Merchant category
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MerchantCategory {
    #[default]
    Retail,
    Online,
    Restaurant,
    Gas,
    Atm,
    Gambling,
    Adult,
    Crypto,
    HighRisk,
}

impl MerchantCategory {
    pub const ALL: [MerchantCategory; 9] = [
        MerchantCategory::Retail,
        MerchantCategory::Online,
        MerchantCategory::Restaurant,
        MerchantCategory::Gas,
        MerchantCategory::Atm,
        MerchantCategory::Gambling,
        MerchantCategory::Adult,
        MerchantCategory::Crypto,
        MerchantCategory::HighRisk,
    ];

    /// Human-readable label used in factor descriptions
    pub fn label(&self) -> &'static str {
        match self {
            MerchantCategory::Retail => "Retail Store",
            MerchantCategory::Online => "Online Shopping",
            MerchantCategory::Restaurant => "Restaurant",
            MerchantCategory::Gas => "Gas Station",
            MerchantCategory::Atm => "ATM Withdrawal",
            MerchantCategory::Gambling => "Gambling",
            MerchantCategory::Adult => "Adult Entertainment",
            MerchantCategory::Crypto => "Cryptocurrency",
            MerchantCategory::HighRisk => "High-risk Merchant",
        }
    }
}

impl std::fmt::Display for MerchantCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MerchantCategory::Retail => write!(f, "retail"),
            MerchantCategory::Online => write!(f, "online"),
            MerchantCategory::Restaurant => write!(f, "restaurant"),
            MerchantCategory::Gas => write!(f, "gas"),
            MerchantCategory::Atm => write!(f, "atm"),
            MerchantCategory::Gambling => write!(f, "gambling"),
            MerchantCategory::Adult => write!(f, "adult"),
            MerchantCategory::Crypto => write!(f, "crypto"),
            MerchantCategory::HighRisk => write!(f, "high-risk"),
        }
    }
}

impl FromStr for MerchantCategory {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MerchantCategory::ALL
            .into_iter()
            .find(|category| category.to_string() == s)
            .ok_or_else(|| {
                ScoringError::InvalidConfiguration(format!("unknown merchant category: {}", s))
            })
    }
}

/// Time-of-day bucket
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TimeOfDay {
    #[default]
    Business,
    Evening,
    LateNight,
    EarlyMorning,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Business,
        TimeOfDay::Evening,
        TimeOfDay::LateNight,
        TimeOfDay::EarlyMorning,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeOfDay::Business => "Business Hours (9AM-5PM)",
            TimeOfDay::Evening => "Evening (5PM-10PM)",
            TimeOfDay::LateNight => "Late Night (10PM-6AM)",
            TimeOfDay::EarlyMorning => "Early Morning (6AM-9AM)",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeOfDay::Business => write!(f, "business"),
            TimeOfDay::Evening => write!(f, "evening"),
            TimeOfDay::LateNight => write!(f, "late-night"),
            TimeOfDay::EarlyMorning => write!(f, "early-morning"),
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeOfDay::ALL
            .into_iter()
            .find(|bucket| bucket.to_string() == s)
            .ok_or_else(|| {
                ScoringError::InvalidConfiguration(format!("unknown time bucket: {}", s))
            })
    }
}

/// Device the transaction was initiated from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    #[default]
    Mobile,
    Desktop,
    Tablet,
    Pos,
    Unknown,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Mobile => write!(f, "mobile"),
            DeviceType::Desktop => write!(f, "desktop"),
            DeviceType::Tablet => write!(f, "tablet"),
            DeviceType::Pos => write!(f, "pos"),
            DeviceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Card transaction submitted for risk evaluation.
///
/// Evaluation only ever borrows a transaction, so a constructed value is never
/// modified by scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: f64,
    pub merchant_category: MerchantCategory,
    pub time_of_day: TimeOfDay,
    pub card_present: bool,
    pub device_type: DeviceType,
    /// Transactions on the same card within the preceding hour
    pub recent_transactions: u32,
    pub location: String,
    pub cvv: String,
    pub card_number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

impl Transaction {
    /// Amount used for scoring; negative and non-finite amounts count as zero
    pub fn effective_amount(&self) -> f64 {
        if self.amount.is_finite() && self.amount > 0.0 {
            self.amount
        } else {
            0.0
        }
    }

    /// Card number with all whitespace removed
    pub fn normalized_card_number(&self) -> String {
        self.card_number.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

/// Transaction as captured from an input form, before validation.
///
/// Numeric fields arrive as text and are parsed leniently by
/// [`Transaction::try_from`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    pub card_number: Option<String>,
    pub transaction_amount: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
    pub cvv: Option<String>,
    pub merchant_category: MerchantCategory,
    pub time_of_day: TimeOfDay,
    pub device_type: DeviceType,
    pub card_present: bool,
    pub transaction_location: Option<String>,
    pub previous_transactions: Option<String>,
}

impl Default for RawTransaction {
    fn default() -> Self {
        Self {
            card_number: None,
            transaction_amount: None,
            expiry_month: None,
            expiry_year: None,
            cvv: None,
            merchant_category: MerchantCategory::Retail,
            time_of_day: TimeOfDay::Business,
            device_type: DeviceType::Mobile,
            card_present: true,
            transaction_location: None,
            previous_transactions: None,
        }
    }
}

impl TryFrom<&RawTransaction> for Transaction {
    type Error = ScoringError;

    fn try_from(raw: &RawTransaction) -> Result<Self, Self::Error> {
        let card_number = required_field(&raw.card_number, "card_number")?;
        let amount_text = required_field(&raw.transaction_amount, "transaction_amount")?;

        let amount = match amount_text.trim().parse::<f64>() {
            Ok(amount) if amount.is_finite() => amount.max(0.0),
            _ => 0.0,
        };

        // Absent or unparseable counts fall back to a single transaction
        let recent_transactions = raw
            .previous_transactions
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|v| v.clamp(0, i64::from(u32::MAX)) as u32)
            .unwrap_or(1);

        Ok(Transaction {
            amount,
            merchant_category: raw.merchant_category,
            time_of_day: raw.time_of_day,
            card_present: raw.card_present,
            device_type: raw.device_type,
            recent_transactions,
            location: raw.transaction_location.clone().unwrap_or_default(),
            cvv: raw.cvv.clone().unwrap_or_default(),
            card_number: card_number.to_string(),
            expiry_month: parse_or_zero(&raw.expiry_month),
            expiry_year: parse_or_zero(&raw.expiry_year),
        })
    }
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = ScoringError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        Transaction::try_from(&raw)
    }
}

fn required_field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ScoringError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => {
            warn!(field = name, "transaction refused: required field missing");
            Err(ScoringError::MissingRequiredField(name.to_string()))
        }
    }
}

fn parse_or_zero<T: FromStr + Default>(value: &Option<String>) -> T {
    value
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

//! Risk evaluation: runs a catalog over a transaction and classifies the total.

use crate::catalog::{CatalogHandle, RuleCatalog};
use crate::rules::Factor;
use crate::{RawTransaction, ScoringError, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Maximum score a verdict can carry
pub const MAX_SCORE: u8 = 100;

/// Discrete risk class derived from the score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Legitimate, // 0-19
    LowRisk,    // 20-39
    MediumRisk, // 40-69
    HighRisk,   // 70-100
}

impl RiskTier {
    /// Classify a clamped score
    pub fn from_score(score: u8) -> Self {
        match score {
            70..=u8::MAX => RiskTier::HighRisk,
            40..=69 => RiskTier::MediumRisk,
            20..=39 => RiskTier::LowRisk,
            _ => RiskTier::Legitimate,
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        match self {
            RiskTier::HighRisk => Recommendation::BlockTransaction,
            RiskTier::MediumRisk => Recommendation::ManualReview,
            RiskTier::LowRisk => Recommendation::ApproveWithMonitoring,
            RiskTier::Legitimate => Recommendation::ApproveTransaction,
        }
    }

    /// Confidence in the classification, in percent
    pub fn confidence(&self) -> u8 {
        match self {
            RiskTier::HighRisk => 95,
            RiskTier::MediumRisk => 85,
            RiskTier::LowRisk => 90,
            RiskTier::Legitimate => 98,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Legitimate => write!(f, "LEGITIMATE"),
            RiskTier::LowRisk => write!(f, "LOW_RISK"),
            RiskTier::MediumRisk => write!(f, "MEDIUM_RISK"),
            RiskTier::HighRisk => write!(f, "HIGH_RISK"),
        }
    }
}

/// Recommended action for a transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    ApproveTransaction,
    ApproveWithMonitoring,
    ManualReview,
    BlockTransaction,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::ApproveTransaction => write!(f, "APPROVE_TRANSACTION"),
            Recommendation::ApproveWithMonitoring => write!(f, "APPROVE_WITH_MONITORING"),
            Recommendation::ManualReview => write!(f, "MANUAL_REVIEW"),
            Recommendation::BlockTransaction => write!(f, "BLOCK_TRANSACTION"),
        }
    }
}

/// Evaluation result for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub transaction_id: String,
    /// Sum of rule impacts, clamped to 0-100
    pub score: u8,
    pub tier: RiskTier,
    pub recommendation: Recommendation,
    pub confidence: u8,
    /// Rules that fired, in catalog order
    pub factors: Vec<Factor>,
    /// Fingerprint of the catalog that produced this verdict
    pub catalog_fingerprint: String,
    pub evaluated_at: DateTime<Utc>,
}

impl Verdict {
    /// Transaction can go through without review
    pub fn is_approved(&self) -> bool {
        matches!(
            self.recommendation,
            Recommendation::ApproveTransaction | Recommendation::ApproveWithMonitoring
        )
    }

    pub fn requires_manual_review(&self) -> bool {
        self.recommendation == Recommendation::ManualReview
    }

    pub fn is_blocked(&self) -> bool {
        self.recommendation == Recommendation::BlockTransaction
    }

    /// Impact of a named factor, if it fired
    pub fn factor_impact(&self, rule: &str) -> Option<u32> {
        self.factors
            .iter()
            .find(|factor| factor.rule == rule)
            .map(|factor| factor.impact)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Stateless risk evaluator.
///
/// Holds only a shared, immutable catalog, so a single evaluator can be used
/// from many threads at once.
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    catalog: CatalogHandle,
}

impl RiskEvaluator {
    pub fn new(catalog: CatalogHandle) -> Self {
        Self { catalog }
    }

    /// Evaluator over the full card analysis rule set
    pub fn detailed() -> Self {
        Self::new(RuleCatalog::detailed().into_handle())
    }

    /// Evaluator over the reduced parameter-sweep rule set
    pub fn parameter_sweep() -> Self {
        Self::new(RuleCatalog::parameter_sweep().into_handle())
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Evaluate a transaction now
    pub fn evaluate(&self, transaction: &Transaction) -> Verdict {
        self.evaluate_at(transaction, Utc::now())
    }

    /// Evaluate a transaction as of `now`.
    ///
    /// `now` decides card expiry and stamps the verdict; nothing else reads
    /// the clock.
    pub fn evaluate_at(&self, transaction: &Transaction, now: DateTime<Utc>) -> Verdict {
        let mut total = 0u32;
        let mut factors = Vec::new();

        for rule in self.catalog.compiled_rules() {
            let contribution = rule.apply(transaction, self.catalog.weights(), &now);
            if !contribution.is_fired() {
                continue;
            }

            debug!(rule = rule.name(), impact = contribution.impact, "risk rule fired");
            total = total.saturating_add(contribution.impact);
            factors.push(Factor {
                rule: rule.name().to_string(),
                impact: contribution.impact,
                description: contribution.description.unwrap_or_default(),
            });
        }

        let score = total.min(u32::from(MAX_SCORE)) as u8;
        let tier = RiskTier::from_score(score);
        let verdict = Verdict {
            transaction_id: format!("TXN-{}", Uuid::new_v4()),
            score,
            tier,
            recommendation: tier.recommendation(),
            confidence: tier.confidence(),
            factors,
            catalog_fingerprint: self.catalog.fingerprint().to_string(),
            evaluated_at: now,
        };

        debug!(
            transaction_id = %verdict.transaction_id,
            score = verdict.score,
            tier = %verdict.tier,
            "transaction evaluated"
        );

        verdict
    }

    /// Validate raw form input and evaluate it
    pub fn evaluate_raw(&self, raw: &RawTransaction) -> Result<Verdict, ScoringError> {
        let transaction = Transaction::try_from(raw)?;
        Ok(self.evaluate(&transaction))
    }

    /// Evaluate multiple transactions in order
    pub fn evaluate_batch(&self, transactions: &[Transaction]) -> Vec<Verdict> {
        transactions.iter().map(|tx| self.evaluate(tx)).collect()
    }
}

impl Default for RiskEvaluator {
    fn default() -> Self {
        Self::detailed()
    }
}

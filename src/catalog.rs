//! Rule catalog: the ordered rule set plus the weight tables it reads.
//!
//! Catalogs are validated once, at configuration time. Evaluation against a
//! configured catalog cannot fail.

use crate::rules::{CompiledRule, Rule, RuleKind};
use crate::weights::RiskWeights;
use crate::ScoringError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared, immutable reference to a configured catalog
pub type CatalogHandle = Arc<RuleCatalog>;

/// Serializable catalog definition, as stored in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub merchant_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub time_weights: BTreeMap<String, f64>,
}

/// Ordered set of validated risk rules
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<CompiledRule>,
    weights: RiskWeights,
    fingerprint: String,
}

impl RuleCatalog {
    /// Validate rules and build a catalog. Rule order is evaluation order.
    pub fn new(rules: Vec<Rule>, weights: RiskWeights) -> Result<Self, ScoringError> {
        let mut names = HashSet::new();
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(ScoringError::InvalidConfiguration(format!(
                    "duplicate rule name: {}",
                    rule.name
                )));
            }
            compiled.push(rule.compile()?);
        }

        let config = CatalogConfig {
            rules,
            merchant_weights: weights.merchant_table(),
            time_weights: weights.time_table(),
        };
        let fingerprint = fingerprint(&config)?;

        info!(
            rules = compiled.len(),
            fingerprint = %fingerprint,
            "rule catalog configured"
        );

        Ok(Self {
            rules: compiled,
            weights,
            fingerprint,
        })
    }

    /// Build a catalog from a configuration document
    pub fn from_config(config: CatalogConfig) -> Result<Self, ScoringError> {
        let weights = RiskWeights::from_named(config.merchant_weights, config.time_weights)?;
        Self::new(config.rules, weights)
    }

    /// Load catalog from JSON
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        let config: CatalogConfig = serde_json::from_str(json)
            .map_err(|e| ScoringError::InvalidConfiguration(format!("malformed catalog: {}", e)))?;
        Self::from_config(config)
    }

    /// Load catalog from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScoringError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ScoringError::InvalidConfiguration(format!(
                "cannot read catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Full rule set used for per-transaction card analysis
    pub fn detailed() -> Self {
        Self::new(detailed_rules(), RiskWeights::detailed())
            .expect("built-in detailed catalog is valid")
    }

    /// Reduced rule set used for parameter-sweep risk assessment
    pub fn parameter_sweep() -> Self {
        Self::new(parameter_sweep_rules(), RiskWeights::parameter_sweep())
            .expect("built-in parameter sweep catalog is valid")
    }

    /// Export the catalog definition
    pub fn to_config(&self) -> CatalogConfig {
        CatalogConfig {
            rules: self.rules().cloned().collect(),
            merchant_weights: self.weights.merchant_table(),
            time_weights: self.weights.time_table(),
        }
    }

    /// Export the catalog definition as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_config())
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(CompiledRule::rule)
    }

    pub fn compiled_rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// SHA-256 of the canonical catalog definition
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_handle(self) -> CatalogHandle {
        Arc::new(self)
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::detailed()
    }
}

/// Configure a catalog from rules and tag-keyed weight tables
pub fn configure_catalog<M, T>(
    rules: Vec<Rule>,
    merchant_weights: M,
    time_weights: T,
) -> Result<CatalogHandle, ScoringError>
where
    M: IntoIterator<Item = (String, f64)>,
    T: IntoIterator<Item = (String, f64)>,
{
    let weights = RiskWeights::from_named(merchant_weights, time_weights)?;
    RuleCatalog::new(rules, weights).map(RuleCatalog::into_handle)
}

fn fingerprint(config: &CatalogConfig) -> Result<String, ScoringError> {
    let canonical = serde_json::to_vec(config).map_err(|e| {
        ScoringError::InvalidConfiguration(format!("catalog is not serializable: {}", e))
    })?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

fn detailed_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "High transaction amount",
            RuleKind::AmountBand {
                above: 5000.0,
                up_to: None,
                points: 25,
            },
        )
        .with_description("{amount} exceeds normal spending"),
        Rule::new(
            "Elevated transaction amount",
            RuleKind::AmountBand {
                above: 1000.0,
                up_to: Some(5000.0),
                points: 15,
            },
        )
        .with_description("{amount} above average"),
        Rule::new(
            "Moderate transaction amount",
            RuleKind::AmountBand {
                above: 500.0,
                up_to: Some(1000.0),
                points: 8,
            },
        )
        .with_description("{amount} slightly elevated"),
        Rule::new(
            "High-risk merchant category",
            RuleKind::MerchantCategory {
                scale: 30.0,
                above: 15.0,
            },
        ),
        Rule::new(
            "Unusual transaction time",
            RuleKind::TimeOfDay {
                scale: 20.0,
                above: 5.0,
            },
        ),
        Rule::new("Card not present", RuleKind::CardNotPresent { points: 20 }),
        Rule::new("Unknown device", RuleKind::UnknownDevice { points: 15 }),
        Rule::new(
            "High transaction velocity",
            RuleKind::VelocityBand {
                above: 5,
                up_to: None,
                points: 20,
            },
        )
        .with_description("{count} transactions in short timeframe"),
        Rule::new(
            "Elevated transaction velocity",
            RuleKind::VelocityBand {
                above: 3,
                up_to: Some(5),
                points: 10,
            },
        )
        .with_description("{count} recent transactions detected"),
        Rule::new(
            "International transaction",
            RuleKind::LocationPattern {
                pattern: "international|foreign".to_string(),
                points: 15,
            },
        )
        .with_description("Cross-border transaction detected"),
        Rule::new("Invalid CVV format", RuleKind::InvalidCvv { points: 10 }),
        Rule::new("Invalid card number", RuleKind::InvalidCardNumber { points: 15 }),
        Rule::new("Expired card", RuleKind::ExpiredCard { points: 30 }),
    ]
}

fn parameter_sweep_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "High transaction amount",
            RuleKind::AmountBand {
                above: 1000.0,
                up_to: None,
                points: 20,
            },
        ),
        Rule::new(
            "Elevated transaction amount",
            RuleKind::AmountBand {
                above: 500.0,
                up_to: Some(1000.0),
                points: 10,
            },
        ),
        Rule::new(
            "Moderate transaction amount",
            RuleKind::AmountBand {
                above: 100.0,
                up_to: Some(500.0),
                points: 5,
            },
        ),
        Rule::new(
            "Transaction velocity",
            RuleKind::VelocityLinear {
                points_per_transaction: 5,
            },
        ),
        Rule::new(
            "International transaction",
            RuleKind::LocationPattern {
                pattern: "international".to_string(),
                points: 15,
            },
        ),
        Rule::new(
            "High-risk location",
            RuleKind::LocationPattern {
                pattern: "high-risk".to_string(),
                points: 25,
            },
        ),
        Rule::new(
            "Unusual transaction time",
            RuleKind::TimeOfDay {
                scale: 20.0,
                above: 0.0,
            },
        ),
        Rule::new(
            "High-risk merchant category",
            RuleKind::MerchantCategory {
                scale: 20.0,
                above: 0.0,
            },
        ),
        Rule::new("Card not present", RuleKind::CardNotPresent { points: 15 }),
        Rule::new("Unknown device", RuleKind::UnknownDevice { points: 10 }),
    ]
}

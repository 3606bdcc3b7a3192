//! Base-risk tables for merchant categories and time-of-day buckets.
//!
//! Weights are in `[0, 1]` and are scaled into points by the rules that read them.

use crate::{MerchantCategory, ScoringError, TimeOfDay};
use serde::Serialize;
use std::collections::BTreeMap;

/// Merchant and time-of-day base-risk weights
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskWeights {
    merchant: BTreeMap<MerchantCategory, f64>,
    time: BTreeMap<TimeOfDay, f64>,
}

impl RiskWeights {
    /// Create weight tables, rejecting weights outside `[0, 1]`
    pub fn new(
        merchant: BTreeMap<MerchantCategory, f64>,
        time: BTreeMap<TimeOfDay, f64>,
    ) -> Result<Self, ScoringError> {
        for (category, weight) in &merchant {
            check_weight(&category.to_string(), *weight)?;
        }
        for (bucket, weight) in &time {
            check_weight(&bucket.to_string(), *weight)?;
        }
        Ok(Self { merchant, time })
    }

    /// Create weight tables keyed by tag name, as found in configuration files
    pub fn from_named<M, T>(merchant: M, time: T) -> Result<Self, ScoringError>
    where
        M: IntoIterator<Item = (String, f64)>,
        T: IntoIterator<Item = (String, f64)>,
    {
        let merchant = merchant
            .into_iter()
            .map(|(tag, weight)| Ok((tag.parse::<MerchantCategory>()?, weight)))
            .collect::<Result<BTreeMap<_, _>, ScoringError>>()?;
        let time = time
            .into_iter()
            .map(|(tag, weight)| Ok((tag.parse::<TimeOfDay>()?, weight)))
            .collect::<Result<BTreeMap<_, _>, ScoringError>>()?;
        Self::new(merchant, time)
    }

    /// Weights used by the per-transaction card analysis form
    pub fn detailed() -> Self {
        Self {
            merchant: BTreeMap::from([
                (MerchantCategory::Retail, 0.1),
                (MerchantCategory::Online, 0.3),
                (MerchantCategory::Restaurant, 0.1),
                (MerchantCategory::Gas, 0.2),
                (MerchantCategory::Atm, 0.4),
                (MerchantCategory::Gambling, 0.8),
                (MerchantCategory::Adult, 0.7),
                (MerchantCategory::Crypto, 0.6),
            ]),
            time: BTreeMap::from([
                (TimeOfDay::Business, 0.1),
                (TimeOfDay::Evening, 0.2),
                (TimeOfDay::LateNight, 0.5),
                (TimeOfDay::EarlyMorning, 0.3),
            ]),
        }
    }

    /// Weights used by the parameter-sweep assessment (scaled by 20 points)
    pub fn parameter_sweep() -> Self {
        Self {
            merchant: BTreeMap::from([
                (MerchantCategory::Online, 0.5),
                (MerchantCategory::HighRisk, 1.0),
            ]),
            time: BTreeMap::from([
                (TimeOfDay::LateNight, 0.5),
                (TimeOfDay::EarlyMorning, 0.25),
            ]),
        }
    }

    /// Base risk of a merchant category; unlisted categories carry none
    pub fn merchant_risk(&self, category: MerchantCategory) -> f64 {
        self.merchant.get(&category).copied().unwrap_or(0.0)
    }

    /// Base risk of a time-of-day bucket; unlisted buckets carry none
    pub fn time_risk(&self, bucket: TimeOfDay) -> f64 {
        self.time.get(&bucket).copied().unwrap_or(0.0)
    }

    /// Merchant weights keyed by tag name
    pub fn merchant_table(&self) -> BTreeMap<String, f64> {
        self.merchant
            .iter()
            .map(|(category, weight)| (category.to_string(), *weight))
            .collect()
    }

    /// Time-of-day weights keyed by tag name
    pub fn time_table(&self) -> BTreeMap<String, f64> {
        self.time
            .iter()
            .map(|(bucket, weight)| (bucket.to_string(), *weight))
            .collect()
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self::detailed()
    }
}

fn check_weight(tag: &str, weight: f64) -> Result<(), ScoringError> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return Err(ScoringError::InvalidConfiguration(format!(
            "weight for {} must be within [0, 1], got {}",
            tag, weight
        )));
    }
    Ok(())
}

//! Transaction risk scoring example
//!
//! Scores a handful of card transactions with both built-in rule catalogs,
//! keeps a session history and shows how operators retune merchant weights.

use card_risk_scorer::{
    configure_catalog, DeviceType, MerchantCategory, RawTransaction, RiskEvaluator, RuleCatalog,
    SharedHistory, TimeOfDay, Verdict,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn print_verdict(verdict: &Verdict) {
    println!("   Transaction ID: {}", verdict.transaction_id);
    println!("   Score: {}/100", verdict.score);
    println!("   Tier: {}", verdict.tier);
    println!("   Recommendation: {}", verdict.recommendation);
    println!("   Confidence: {}%", verdict.confidence);
    for factor in &verdict.factors {
        println!(
            "     +{:>3}  {} ({})",
            factor.impact, factor.rule, factor.description
        );
    }
    println!();
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Card Transaction Risk Scoring ===\n");

    let evaluator = Arc::new(RiskEvaluator::detailed());
    let history = SharedHistory::new();

    // Example 1: Everyday in-store purchase
    println!("1. In-store Grocery Purchase");
    let grocery = RawTransaction {
        card_number: Some("4532 0151 1283 0366".to_string()),
        transaction_amount: Some("86.40".to_string()),
        expiry_month: Some("09".to_string()),
        expiry_year: Some("2031".to_string()),
        cvv: Some("481".to_string()),
        transaction_location: Some("Seattle, WA".to_string()),
        ..Default::default()
    };
    match evaluator.evaluate_raw(&grocery) {
        Ok(verdict) => {
            print_verdict(&verdict);
            history.append(verdict);
        }
        Err(e) => println!("   Refused: {}\n", e),
    }

    // Example 2: Late-night online gambling from an unknown device abroad
    println!("2. Late-night Gambling Deposit");
    let gambling = RawTransaction {
        card_number: Some("5500 0000 0000 0004".to_string()),
        transaction_amount: Some("6400".to_string()),
        expiry_month: Some("03".to_string()),
        expiry_year: Some("2030".to_string()),
        cvv: Some("12".to_string()),
        merchant_category: MerchantCategory::Gambling,
        time_of_day: TimeOfDay::LateNight,
        device_type: DeviceType::Unknown,
        card_present: false,
        transaction_location: Some("Foreign - Malta".to_string()),
        previous_transactions: Some("6".to_string()),
    };
    match evaluator.evaluate_raw(&gambling) {
        Ok(verdict) => {
            print_verdict(&verdict);
            history.append(verdict);
        }
        Err(e) => println!("   Refused: {}\n", e),
    }

    // Example 3: Missing amount is refused outright
    println!("3. Incomplete Form");
    let incomplete = RawTransaction {
        card_number: Some("4111 1111 1111 1111".to_string()),
        ..Default::default()
    };
    match evaluator.evaluate_raw(&incomplete) {
        Ok(verdict) => print_verdict(&verdict),
        Err(e) => println!("   Refused: {}\n", e),
    }

    // Example 4: Same engine, parameter-sweep profile
    println!("4. Parameter Sweep Profile");
    let sweep = RiskEvaluator::parameter_sweep();
    for velocity in [1, 3, 5] {
        let raw = RawTransaction {
            card_number: Some("4111 1111 1111 1111".to_string()),
            transaction_amount: Some("750".to_string()),
            merchant_category: MerchantCategory::Online,
            previous_transactions: Some(velocity.to_string()),
            ..Default::default()
        };
        if let Ok(verdict) = sweep.evaluate_raw(&raw) {
            println!(
                "   velocity={} -> score={} tier={}",
                velocity, verdict.score, verdict.tier
            );
        }
    }
    println!();

    // Example 5: Operators retune merchant weights without touching rules
    println!("5. Retuned Catalog");
    let config = RuleCatalog::detailed().to_config();
    let mut merchant_weights = config.merchant_weights.clone();
    merchant_weights.insert("crypto".to_string(), 0.9);
    match configure_catalog(config.rules, merchant_weights, config.time_weights) {
        Ok(catalog) => {
            println!("   Catalog fingerprint: {}", catalog.fingerprint());
            let retuned = RiskEvaluator::new(catalog);
            let crypto = RawTransaction {
                card_number: Some("4111 1111 1111 1111".to_string()),
                transaction_amount: Some("300".to_string()),
                expiry_month: Some("01".to_string()),
                expiry_year: Some("2032".to_string()),
                cvv: Some("999".to_string()),
                merchant_category: MerchantCategory::Crypto,
                ..Default::default()
            };
            if let Ok(verdict) = retuned.evaluate_raw(&crypto) {
                print_verdict(&verdict);
                history.append(verdict);
            }
        }
        Err(e) => println!("   Rejected catalog: {}\n", e),
    }

    // Example 6: Concurrent scoring into one session history
    println!("6. Concurrent Scoring");
    std::thread::scope(|scope| {
        for worker in 0..3 {
            let evaluator = Arc::clone(&evaluator);
            let history = history.clone();
            scope.spawn(move || {
                for i in 0..4 {
                    let raw = RawTransaction {
                        card_number: Some("4111 1111 1111 1111".to_string()),
                        transaction_amount: Some(format!("{}", (worker * 4 + i) * 450)),
                        expiry_month: Some("12".to_string()),
                        expiry_year: Some("2030".to_string()),
                        cvv: Some("123".to_string()),
                        ..Default::default()
                    };
                    if let Ok(verdict) = evaluator.evaluate_raw(&raw) {
                        history.append(verdict);
                    }
                }
            });
        }
    });

    let stats = history.stats();
    println!("   History size: {}", stats.total);
    println!("   Average score: {:.1}", stats.average_score);
    println!(
        "   Tiers: legitimate={} low={} medium={} high={}",
        stats.legitimate, stats.low_risk, stats.medium_risk, stats.high_risk
    );

    println!("\n   Most recent:");
    for verdict in history.recent(5) {
        println!(
            "   {} score={} {}",
            verdict.transaction_id, verdict.score, verdict.recommendation
        );
    }
}

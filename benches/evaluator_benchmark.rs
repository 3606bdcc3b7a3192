use card_risk_scorer::{
    DeviceType, EvaluationHistory, MerchantCategory, RiskEvaluator, TimeOfDay, Transaction,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn create_transaction(amount: f64, risky: bool) -> Transaction {
    Transaction {
        amount,
        merchant_category: if risky {
            MerchantCategory::Gambling
        } else {
            MerchantCategory::Retail
        },
        time_of_day: if risky {
            TimeOfDay::LateNight
        } else {
            TimeOfDay::Business
        },
        card_present: !risky,
        device_type: if risky {
            DeviceType::Unknown
        } else {
            DeviceType::Mobile
        },
        recent_transactions: if risky { 7 } else { 1 },
        location: if risky {
            "Foreign - Macau".to_string()
        } else {
            "Portland, OR".to_string()
        },
        cvv: "123".to_string(),
        card_number: "4111 1111 1111 1111".to_string(),
        expiry_month: 10,
        expiry_year: 2030,
    }
}

fn bench_single_evaluation(c: &mut Criterion) {
    let evaluator = RiskEvaluator::detailed();
    let clean = create_transaction(120.0, false);
    let risky = create_transaction(7200.0, true);

    c.bench_function("evaluate_clean_transaction", |b| {
        b.iter(|| evaluator.evaluate(black_box(&clean)))
    });

    c.bench_function("evaluate_risky_transaction", |b| {
        b.iter(|| evaluator.evaluate(black_box(&risky)))
    });
}

fn bench_parameter_sweep(c: &mut Criterion) {
    let evaluator = RiskEvaluator::parameter_sweep();
    let transactions: Vec<Transaction> = (0..100)
        .map(|i| create_transaction(f64::from(i) * 50.0, i % 3 == 0))
        .collect();

    c.bench_function("parameter_sweep_100", |b| {
        b.iter(|| evaluator.evaluate_batch(black_box(&transactions)))
    });
}

fn bench_history_append(c: &mut Criterion) {
    let evaluator = RiskEvaluator::detailed();
    let verdict = evaluator.evaluate(&create_transaction(900.0, false));

    c.bench_function("history_append_1000", |b| {
        b.iter(|| {
            let mut history = EvaluationHistory::new();
            for _ in 0..1000 {
                history.append(black_box(verdict.clone()));
            }
            history
        })
    });
}

criterion_group!(
    benches,
    bench_single_evaluation,
    bench_parameter_sweep,
    bench_history_append
);
criterion_main!(benches);

use std::hint::black_box;

use churnsight::data::CustomerRecord;
use churnsight::explain::{Explainer, sample_background};
use churnsight::features::FeatureTransformer;
use churnsight::ml::{ForestOptions, fit};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

const CUSTOMER_COUNT: usize = 500;
const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];

fn customers() -> Vec<CustomerRecord> {
    (0..CUSTOMER_COUNT)
        .map(|i| {
            let contract = CONTRACTS[i % CONTRACTS.len()];
            let tenure = (i * 7 % 72) as u32;
            let monthly = 20.0 + (i * 13 % 90) as f64;
            CustomerRecord::new(format!("c{i}"), tenure, contract, monthly)
                .with_payment_method(if i % 4 == 0 {
                    "Credit card (automatic)"
                } else {
                    "Electronic check"
                })
                .with_churn(contract == "Month-to-month" && tenure < 24)
        })
        .collect()
}

fn bench_explain(c: &mut Criterion) {
    let records = customers();
    let labels: Vec<bool> = records.iter().map(|r| r.churn == Some(true)).collect();
    let transformer = FeatureTransformer::fit(&records);
    let vectors = transformer.transform_all(&records).expect("transform");
    let model = fit(&vectors, &labels, &ForestOptions::default()).expect("fit");
    let mut group = c.benchmark_group("explain");
    for background_size in [10usize, 50, 100] {
        let background = sample_background(&vectors, background_size, 42);
        let explainer = Explainer::new(&model, &background).expect("explainer");
        group.bench_with_input(
            BenchmarkId::new("tree_shap", background_size),
            &vectors[..10],
            |b, batch| {
                b.iter(|| explainer.explain_all(black_box(batch)).expect("explain"));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_explain);
criterion_main!(benches);

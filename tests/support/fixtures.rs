use std::io::Write;
use std::path::Path;

use churnsight::config::PipelineConfig;
use churnsight::data::{CustomerRecord, Service};
use churnsight::ml::ForestOptions;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

pub const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const INTERNET: [&str; 3] = ["DSL", "Fiber optic", "No"];
const PAYMENTS: [&str; 4] = [
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];

/// Labeled customers where short-tenure month-to-month accounts churn.
pub fn labeled_records(count: usize, seed: u64) -> Vec<CustomerRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|idx| {
            let contract = CONTRACTS[idx % CONTRACTS.len()];
            let tenure: u32 = rng.random_range(0..72);
            let monthly: f64 = (rng.random_range(2000..11000) as f64) / 100.0;
            let services: Vec<Service> = Service::ALL
                .into_iter()
                .filter(|_| rng.random_bool(0.4))
                .collect();
            let churn = contract == "Month-to-month" && (tenure <= 24 || monthly > 90.0);
            let mut record = CustomerRecord::new(format!("cust-{idx:04}"), tenure, contract, monthly)
                .with_internet_service(*INTERNET.choose(&mut rng).unwrap_or(&"DSL"))
                .with_payment_method(*PAYMENTS.choose(&mut rng).unwrap_or(&"Mailed check"))
                .with_services(services)
                .with_churn(churn);
            record.total_charges = Some(monthly * tenure as f64);
            record.partner = rng.random_bool(0.5);
            record.dependents = rng.random_bool(0.3);
            record.senior_citizen = rng.random_bool(0.15);
            record.paperless_billing = rng.random_bool(0.6);
            record
        })
        .collect()
}

/// Three unlabeled customers spanning the tenure cohorts and contract types.
pub fn scoring_records() -> Vec<CustomerRecord> {
    vec![
        CustomerRecord::new("new-2", 2, "Month-to-month", 95.0)
            .with_internet_service("Fiber optic")
            .with_payment_method("Electronic check"),
        CustomerRecord::new("mid-10", 10, "One year", 60.0)
            .with_internet_service("DSL")
            .with_payment_method("Mailed check")
            .with_services([Service::PhoneService, Service::OnlineSecurity]),
        CustomerRecord::new("old-30", 30, "Two year", 45.0)
            .with_internet_service("DSL")
            .with_payment_method("Credit card (automatic)")
            .with_services([Service::PhoneService, Service::TechSupport, Service::StreamingTv]),
    ]
}

/// Small forest and background so tests stay fast.
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.forest = ForestOptions {
        n_trees: 15,
        max_depth: 6,
        ..ForestOptions::default()
    };
    config.explain.background_size = 25;
    config.logging.file = false;
    config
}

pub fn write_jsonl(path: &Path, records: &[CustomerRecord]) {
    let mut file = std::fs::File::create(path).unwrap();
    for record in records {
        serde_json::to_writer(&mut file, record).unwrap();
        file.write_all(b"\n").unwrap();
    }
}

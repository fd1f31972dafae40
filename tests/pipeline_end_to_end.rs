mod support;

use churnsight::data::{self, load_records};
use churnsight::export::gold_header;
use churnsight::features::TenureGroup;
use churnsight::gold::{AlignmentError, GoldBuilder, GoldError};
use churnsight::pipeline::{self, PipelineError, RunPaths};
use support::fixtures::{fast_config, labeled_records, scoring_records, write_jsonl};

#[test]
fn trains_scores_and_explains_three_customers() {
    let config = fast_config();
    let training = labeled_records(80, 11);
    let outcome = pipeline::train(&training, &config).unwrap();
    assert!(outcome.train_rows >= 50);
    assert_eq!(outcome.train_rows + outcome.test_rows, 80);

    let customers = scoring_records();
    let groups: Vec<TenureGroup> = customers
        .iter()
        .map(|c| TenureGroup::from_months(c.tenure_months))
        .collect();
    assert_eq!(
        groups,
        [
            TenureGroup::UpToSixMonths,
            TenureGroup::UpToOneYear,
            TenureGroup::Veteran
        ]
    );

    let scored = pipeline::score(&customers, &outcome.bundle, &config).unwrap();
    assert_eq!(scored.predictions.len(), 3);
    for prediction in &scored.predictions {
        assert!((0.0..=1.0).contains(&prediction.probability));
    }
    for (set, prediction) in scored.attributions.iter().zip(&scored.predictions) {
        assert_eq!(set.customer_id, prediction.customer_id);
        assert_eq!(set.raw_output, prediction.probability);
        let tolerance = 1e-6 * set.raw_output.abs().max(1.0);
        assert!(set.additivity_gap().abs() <= tolerance);
    }
    assert_eq!(scored.gold.len(), 3);
    for (gold, customer) in scored.gold.iter().zip(&customers) {
        assert_eq!(gold.customer_id, customer.customer_id);
        assert!(!gold.main_reason.is_empty());
        assert_eq!(gold.top_attributions.len(), config.gold.top_k);
        assert!(gold.top_attributions.iter().all(|a| !a.reason.is_empty()));
    }
}

#[test]
fn run_writes_bundle_gold_and_analytical_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("customers.jsonl");
    write_jsonl(&data_path, &labeled_records(70, 5));
    let paths = RunPaths {
        bundle: dir.path().join("out/model.json"),
        gold: dir.path().join("out/gold.csv"),
        analytical: Some(dir.path().join("out/analytical.csv")),
    };
    let outcome = pipeline::run(&data_path, &paths, &fast_config()).unwrap();
    assert!(outcome.evaluation.is_some());

    let gold = std::fs::read_to_string(&paths.gold).unwrap();
    let mut lines = gold.lines();
    let header = data::csv::split_line(lines.next().unwrap()).unwrap();
    assert_eq!(header, gold_header(3));
    assert_eq!(lines.count(), 70);
    assert!(paths.bundle.is_file());
    let analytical = std::fs::read_to_string(paths.analytical.as_ref().unwrap()).unwrap();
    assert_eq!(analytical.lines().count(), 71);
}

#[test]
fn unlabeled_training_data_aborts_without_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("customers.jsonl");
    let mut records = labeled_records(60, 3);
    records[17].churn = None;
    write_jsonl(&data_path, &records);
    let paths = RunPaths {
        bundle: dir.path().join("model.json"),
        gold: dir.path().join("gold.csv"),
        analytical: None,
    };
    let err = pipeline::run(&data_path, &paths, &fast_config()).unwrap_err();
    assert!(matches!(err, PipelineError::Schema(_)));
    assert!(!paths.bundle.exists());
    assert!(!paths.gold.exists());
}

#[test]
fn csv_input_loads_and_scores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    let mut body = String::from(
        "customer_id,tenure_months,contract,monthly_charges,total_charges,phone_service,churn\n",
    );
    for record in labeled_records(60, 9) {
        body.push_str(&format!(
            "{},{},{},{},,{},{}\n",
            record.customer_id,
            record.tenure_months,
            record.contract,
            record.monthly_charges,
            if record.services.is_empty() { "No" } else { "Yes" },
            if record.churn == Some(true) { "Yes" } else { "No" },
        ));
    }
    std::fs::write(&path, body).unwrap();
    let records = load_records(&path).unwrap();
    assert_eq!(records.len(), 60);
    let config = fast_config();
    let trained = pipeline::train(&records, &config).unwrap();
    let scored = pipeline::score(&records[..5], &trained.bundle, &config).unwrap();
    assert_eq!(scored.gold.len(), 5);
}

#[test]
fn gold_build_rejects_records_without_predictions() {
    let config = fast_config();
    let trained = pipeline::train(&labeled_records(60, 21), &config).unwrap();
    let customers = scoring_records();
    let scored = pipeline::score(&customers, &trained.bundle, &config).unwrap();
    let err = GoldBuilder::default()
        .build(&customers, &scored.predictions[..2], &scored.attributions)
        .unwrap_err();
    assert_eq!(
        err,
        GoldError::Alignment(AlignmentError::Missing {
            customer_id: "old-30".to_string(),
            input: "predictions",
        })
    );
}

#[test]
fn unwritable_gold_path_leaves_no_bundle_behind() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("customers.jsonl");
    write_jsonl(&data_path, &labeled_records(60, 13));
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("gold.csv")).unwrap();
    let paths = RunPaths {
        bundle: out.join("model.json"),
        gold: out.join("gold.csv"),
        analytical: Some(out.join("analytical.csv")),
    };
    let err = pipeline::run(&data_path, &paths, &fast_config()).unwrap_err();
    assert!(matches!(err, PipelineError::Export(_)));
    assert!(!paths.bundle.exists());
    assert!(!out.join("analytical.csv").exists());
    let leftovers: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, ["gold.csv"]);
}

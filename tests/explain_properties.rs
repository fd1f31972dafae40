mod support;

use churnsight::explain::{ExplainMethod, Explainer, sample_background};
use churnsight::features::{FeatureTransformer, FeatureVector};
use churnsight::ml::{ForestOptions, TrainedModel, fit};
use support::fixtures::{labeled_records, scoring_records};

fn small_model() -> (FeatureTransformer, TrainedModel, Vec<FeatureVector>) {
    let records = labeled_records(60, 17);
    let labels: Vec<bool> = records.iter().map(|r| r.churn.unwrap()).collect();
    let transformer = FeatureTransformer::fit(&records);
    let vectors = transformer.transform_all(&records).unwrap();
    let options = ForestOptions {
        n_trees: 4,
        max_depth: 4,
        ..ForestOptions::default()
    };
    let model = fit(&vectors, &labels, &options).unwrap();
    (transformer, model, vectors)
}

#[test]
fn tree_walk_matches_coalition_enumeration() {
    let (transformer, model, vectors) = small_model();
    let background = sample_background(&vectors, 3, 1);
    let tree = Explainer::new(&model, &background).unwrap();
    let exact = Explainer::with_method(&model, &background, ExplainMethod::Exact).unwrap();
    assert_eq!(tree.method(), ExplainMethod::Tree);
    assert_eq!(tree.baseline(), exact.baseline());

    for customer in transformer.transform_all(&scoring_records()).unwrap() {
        let fast = tree.explain(&customer).unwrap();
        let slow = exact.explain(&customer).unwrap();
        for (a, b) in fast.contributions.iter().zip(&slow.contributions) {
            assert_eq!(a.feature, b.feature);
            assert!(
                (a.value - b.value).abs() < 1e-9,
                "{}: {} vs {}",
                a.feature,
                a.value,
                b.value
            );
        }
    }
}

#[test]
fn explanations_are_additive_and_bit_identical() {
    let (transformer, model, vectors) = small_model();
    let background = sample_background(&vectors, 20, 7);
    let explainer = Explainer::new(&model, &background).unwrap();
    let customers = transformer.transform_all(&scoring_records()).unwrap();
    let first = explainer.explain_all(&customers).unwrap();
    let second = explainer.explain_all(&customers).unwrap();
    assert_eq!(first, second);
    for set in &first {
        let reconstructed = set.baseline + set.sum();
        assert!((reconstructed - set.raw_output).abs() <= 1e-6);
        assert_eq!(set.contributions.len(), model.feature_names.len());
    }
}

#[test]
fn background_rows_explain_to_their_own_gap() {
    let (_, model, vectors) = small_model();
    let background = vec![vectors[0].clone()];
    let explainer = Explainer::new(&model, &background).unwrap();
    let own = explainer.explain(&vectors[0]).unwrap();
    assert!(own.contributions.iter().all(|a| a.value == 0.0));
    assert_eq!(own.raw_output, explainer.baseline());
}

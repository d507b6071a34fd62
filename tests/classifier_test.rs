use assert_matches::assert_matches;
use fall_detection::models::{timestamp, FeatureRecord, LabeledSample, MovementState};
use fall_detection::services::{
    evaluate_classifier, split_train_test, ClusterClassifier, LabelPropagationClassifier, MovementClassifier,
    RuleBasedClassifier, TreeClassifier,
};
use fall_detection::ClassifierError;
use pretty_assertions::assert_eq;

fn record(angle: f64, rate: f64) -> FeatureRecord {
    FeatureRecord {
        timestamp: timestamp::parse("2024-05-01 12:00:00.000000").unwrap(),
        frame_rate: 12.0,
        cog_angle: angle,
        movement_rate: rate,
    }
}

/// Rule-labeled samples spread around the centre of four bands
fn labeled_population() -> Vec<LabeledSample> {
    let rules = RuleBasedClassifier::new();
    let centres = [(3.0, 2.0), (40.0, 12.0), (85.0, 35.0), (85.0, 80.0)];
    let mut samples = Vec::new();
    for (angle, rate) in centres {
        for i in 0..25 {
            let offset = i as f64 * 0.05 - 0.6;
            let r = record(angle + offset, rate + offset);
            samples.push(LabeledSample::labeled(r, rules.classify(r.cog_angle, r.movement_rate)));
        }
    }
    samples
}

#[test]
fn test_rule_boundaries() {
    let rules = RuleBasedClassifier::new();
    let cases = [
        ((9.9, 5.0), MovementState::LyingStill),
        ((9.9, 4.9), MovementState::Fallen),
        ((70.0, 20.0), MovementState::Walking),
        ((70.0, 50.0), MovementState::Running),
        ((10.0, 19.9), MovementState::AboutToFall),
        ((9.9, 20.0), MovementState::Crawling),
        ((9.9, 50.0), MovementState::Unclassified),
        ((75.0, 10.0), MovementState::Unclassified),
    ];
    for ((angle, rate), expected) in cases {
        assert_eq!(rules.predict(angle, rate).unwrap(), expected, "angle={angle} rate={rate}");
    }
}

#[test]
fn test_trainable_classifiers_refuse_to_predict_untrained() {
    let classifiers: Vec<Box<dyn MovementClassifier>> = vec![
        Box::new(ClusterClassifier::default()),
        Box::new(LabelPropagationClassifier::default()),
        Box::new(TreeClassifier::default()),
    ];
    for classifier in classifiers {
        assert_matches!(classifier.predict(5.0, 1.0), Err(ClassifierError::ModelNotTrained));
        assert_matches!(classifier.predict_record(&record(5.0, 1.0)), Err(ClassifierError::ModelNotTrained));
    }
}

#[test]
fn test_tree_generalizes_to_held_out_samples() {
    let (train, test) = split_train_test(&labeled_population(), 0.2, 42).unwrap();
    assert_eq!(test.len(), 20);

    let mut tree = TreeClassifier::default();
    tree.fit_labeled(&train).unwrap();

    let report = evaluate_classifier(&tree, &test).unwrap();
    assert_eq!(report.sample_count, 20);
    assert!(report.accuracy > 0.95, "accuracy {}", report.accuracy);
}

#[test]
fn test_propagation_recovers_hidden_labels() {
    let population = labeled_population();
    // Keep three labels per group, hide the rest
    let seeded: Vec<LabeledSample> = population
        .iter()
        .enumerate()
        .map(|(i, s)| if i % 25 < 3 { s.clone() } else { LabeledSample::unlabeled(s.features) })
        .collect();

    let mut classifier = LabelPropagationClassifier::default();
    classifier.fit(&seeded).unwrap();

    let report = evaluate_classifier(&classifier, &population).unwrap();
    assert!(report.accuracy > 0.95, "accuracy {}", report.accuracy);
    assert_eq!(classifier.transduction().unwrap().len(), population.len());
}

#[test]
fn test_kmeans_clusters_follow_the_rule_table() {
    let population = labeled_population();
    let records: Vec<FeatureRecord> = population.iter().map(|s| s.features).collect();

    let mut classifier = ClusterClassifier::default();
    let summary = classifier.fit(&records).unwrap();
    assert_eq!(summary.n_clusters, 4);

    let report = evaluate_classifier(&classifier, &population).unwrap();
    assert_eq!(report.accuracy, 1.0);
}

/// Model Evaluation Service
///
/// Train/test splitting and classification metrics for the trainable
/// movement classifiers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::errors::ClassifierError;
use crate::models::{ClassMetrics, EvaluationReport, LabeledSample, MovementState};
use crate::services::movement_classifier::MovementClassifier;

/// Shuffle with a fixed seed and split off `test_ratio` of the samples for testing
pub fn split_train_test<T: Clone>(
    samples: &[T],
    test_ratio: f64,
    seed: u64,
) -> Result<(Vec<T>, Vec<T>), ClassifierError> {
    if !(0.0..=1.0).contains(&test_ratio) {
        return Err(ClassifierError::InvalidConfig(format!(
            "test ratio must be within [0, 1], got {}",
            test_ratio
        )));
    }

    let mut shuffled = samples.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let test_len = (shuffled.len() as f64 * test_ratio).round() as usize;
    let test = shuffled.split_off(shuffled.len() - test_len);
    Ok((shuffled, test))
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Compare predicted states against ground truth
pub fn evaluate(
    predicted: &[MovementState],
    actual: &[MovementState],
) -> Result<EvaluationReport, ClassifierError> {
    if predicted.len() != actual.len() {
        return Err(ClassifierError::LengthMismatch {
            predicted: predicted.len(),
            actual: actual.len(),
        });
    }

    let mut classes: Vec<MovementState> = predicted.iter().chain(actual).copied().collect();
    classes.sort();
    classes.dedup();

    let position = |state: &MovementState| classes.binary_search(state).unwrap_or(0);
    let mut confusion_matrix = vec![vec![0usize; classes.len()]; classes.len()];
    for (p, a) in predicted.iter().zip(actual) {
        confusion_matrix[position(a)][position(p)] += 1;
    }

    let total = actual.len();
    let mut per_class = Vec::with_capacity(classes.len());
    for (c, &state) in classes.iter().enumerate() {
        let tp = confusion_matrix[c][c];
        let support: usize = confusion_matrix[c].iter().sum();
        let predicted_count: usize = confusion_matrix.iter().map(|row| row[c]).sum();
        let fp = predicted_count - tp;
        let fn_ = support - tp;
        let tn = total - tp - fp - fn_;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        per_class.push(ClassMetrics {
            state,
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
            accuracy: ratio(tp + tn, total),
            precision,
            recall,
            f1,
            support,
        });
    }

    let weighted = |score: fn(&ClassMetrics) -> f64| -> f64 {
        if total == 0 {
            return 0.0;
        }
        per_class
            .iter()
            .map(|m| score(m) * m.support as f64)
            .sum::<f64>()
            / total as f64
    };

    let correct = (0..classes.len()).map(|c| confusion_matrix[c][c]).sum();

    Ok(EvaluationReport {
        weighted_precision: weighted(|m| m.precision),
        weighted_recall: weighted(|m| m.recall),
        weighted_f1: weighted(|m| m.f1),
        accuracy: ratio(correct, total),
        classes,
        confusion_matrix,
        per_class,
        sample_count: total,
    })
}

/// Predict every labeled sample and score the predictions; unlabeled samples are ignored
pub fn evaluate_classifier(
    classifier: &dyn MovementClassifier,
    samples: &[LabeledSample],
) -> Result<EvaluationReport, ClassifierError> {
    let mut predicted = Vec::new();
    let mut actual = Vec::new();
    for sample in samples {
        if let Some(state) = sample.state {
            predicted.push(classifier.predict_record(&sample.features)?);
            actual.push(state);
        }
    }
    if actual.is_empty() {
        return Err(ClassifierError::NoLabeledSamples);
    }
    evaluate(&predicted, &actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use MovementState::*;

    #[test]
    fn test_split_is_seeded_and_complete() {
        let samples: Vec<u32> = (0..10).collect();
        let (train, test) = split_train_test(&samples, 0.3, 7).unwrap();
        let (train2, test2) = split_train_test(&samples, 0.3, 7).unwrap();

        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let mut all: Vec<u32> = train.into_iter().chain(test).collect();
        all.sort();
        assert_eq!(all, samples);
    }

    #[test]
    fn test_split_rejects_bad_ratio() {
        assert!(split_train_test(&[1, 2, 3], 1.5, 0).is_err());
    }

    #[test]
    fn test_metrics() {
        let actual = vec![Fallen, Fallen, Walking, Walking, Walking];
        let predicted = vec![Fallen, Walking, Walking, Walking, Fallen];
        let report = evaluate(&predicted, &actual).unwrap();

        assert_eq!(report.classes, vec![Fallen, Walking]);
        assert_eq!(report.confusion_matrix, vec![vec![1, 1], vec![1, 2]]);
        assert!((report.accuracy - 0.6).abs() < 1e-12);

        let fallen = &report.per_class[0];
        assert_eq!(
            (fallen.true_positives, fallen.false_positives, fallen.false_negatives, fallen.true_negatives),
            (1, 1, 1, 2)
        );
        assert!((fallen.precision - 0.5).abs() < 1e-12);
        assert!((fallen.recall - 0.5).abs() < 1e-12);

        let walking = &report.per_class[1];
        assert!((walking.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((walking.f1 - 2.0 / 3.0).abs() < 1e-12);

        let expected_weighted_recall = (0.5 * 2.0 + (2.0 / 3.0) * 3.0) / 5.0;
        assert!((report.weighted_recall - expected_weighted_recall).abs() < 1e-12);
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let report = evaluate(&[Walking, Walking], &[Walking, Running]).unwrap();
        let running = report.per_class.iter().find(|m| m.state == Running).unwrap();
        assert_eq!(running.precision, 0.0);
        assert_eq!(running.recall, 0.0);
        assert_eq!(running.f1, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            evaluate(&[Fallen], &[]),
            Err(ClassifierError::LengthMismatch { predicted: 1, actual: 0 })
        ));
    }
}

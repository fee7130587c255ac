use docstage::{error::MetricsError, langid::calculate_metrics};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn predictions_against_themselves_are_perfect() {
    let codes = ["en", "hi", "ur", "en", "fa"];
    let m = calculate_metrics(&codes, &codes).expect("metrics");
    assert_eq!(m.accuracy, 1.0);
    for code in ["en", "hi", "ur", "fa"] {
        assert_eq!(m.per_language[code].f1, 1.0);
    }
    // Absent languages weigh in at 0.
    assert!(close(m.f1_score, 4.0 / 6.0));
}

#[test]
fn mixed_predictions() {
    let preds = ["en", "en", "hi", "unknown"];
    let truth = ["en", "hi", "hi", "ur"];
    let m = calculate_metrics(&preds, &truth).expect("metrics");

    assert!(close(m.accuracy, 0.5));
    assert!(close(m.per_language["en"].precision, 0.5));
    assert!(close(m.per_language["en"].recall, 1.0));
    assert!(close(m.per_language["hi"].precision, 1.0));
    assert!(close(m.per_language["hi"].recall, 0.5));
    assert_eq!(m.per_language["ur"].support, 1);
    assert_eq!(m.per_language["ur"].f1, 0.0);

    assert!(close(m.precision, 1.5 / 6.0));
    assert!(close(m.recall, 1.5 / 6.0));
    assert!(close(m.f1_score, (4.0 / 3.0) / 6.0));

    assert_eq!(m.confusion_matrix["en"]["en"], 1);
    assert_eq!(m.confusion_matrix["hi"]["en"], 1);
    assert_eq!(m.confusion_matrix["hi"]["hi"], 1);
    assert_eq!(m.confusion_matrix["ur"]["unknown"], 1);
    assert_eq!(m.confusion_matrix["ar"].values().sum::<u64>(), 0);
    assert_eq!(m.confusion_matrix.len(), 6);
    assert_eq!(m.confusion_matrix["en"].len(), 7);
}

#[test]
fn rare_languages_count_as_much_as_frequent_ones() {
    let mut preds = vec!["en"; 98];
    let mut truth = vec!["en"; 98];
    preds.extend(["en", "en"]);
    truth.extend(["ne", "fa"]);
    let m = calculate_metrics(&preds, &truth).expect("metrics");
    assert!(close(m.accuracy, 0.98));
    // English is nearly perfect but Nepali and Persian drag recall down.
    assert!(close(m.recall, 1.0 / 6.0));
}

#[test]
fn mismatched_lengths_are_rejected() {
    let err = calculate_metrics(&["en", "hi"], &["en"]).expect_err("length mismatch");
    match err {
        MetricsError::LengthMismatch {
            predictions,
            ground_truth,
        } => {
            assert_eq!(predictions, 2);
            assert_eq!(ground_truth, 1);
        }
    }
}

#[test]
fn empty_sequences_score_zero() {
    let empty: [&str; 0] = [];
    let m = calculate_metrics(&empty, &empty).expect("metrics");
    assert_eq!(m.accuracy, 0.0);
    assert_eq!(m.f1_score, 0.0);
}

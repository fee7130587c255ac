use docstage::{
    config::Evaluation,
    engine::{ElementKind, TextSimilarity},
    error::ProviderError,
    evaluate::Evaluator,
    textsim::{char_ratio, sentence_bleu, sequence_ratio},
};

struct Fixed(f32);

impl TextSimilarity for Fixed {
    fn label(&self) -> &str {
        "fixed"
    }

    fn similarity(&self, _generated: &str, _reference: &str) -> Result<f32, ProviderError> {
        Ok(self.0)
    }
}

struct Down;

impl TextSimilarity for Down {
    fn label(&self) -> &str {
        "down"
    }

    fn similarity(&self, _generated: &str, _reference: &str) -> Result<f32, ProviderError> {
        Err(ProviderError::Unavailable("scorer not installed".into()))
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn empty_generation_scores_defined_zero() {
    let m = Evaluator::new(&Evaluation::default()).evaluate(
        "",
        "non-empty reference",
        ElementKind::Chart,
    );
    assert!(m.combined_score.is_finite());
    assert!(m.combined_score >= 0.0);
    assert_eq!(m.primary_score, 0.0);
    assert!(m.error().is_none());
}

#[test]
fn identical_text_has_perfect_primary_score() {
    let text = "the chart shows rising sales over time";
    let m = Evaluator::new(&Evaluation::default()).evaluate(text, text, ElementKind::Chart);
    assert!(close(m.primary_score, 1.0));
    assert_eq!(m.secondary_score, 0.0);
    assert!(close(m.combined_score, 0.5));
    assert_eq!(m.details["secondary_source"], "unavailable");
}

#[test]
fn weight_profiles_follow_element_type() {
    let text = "the chart shows rising sales over time";
    let ev = Evaluator::new(&Evaluation::default()).with_secondary(Fixed(0.8));

    let chart = ev.evaluate(text, text, ElementKind::Chart);
    assert!(close(chart.combined_score, 0.5 * 1.0 + 0.5 * 0.8));
    assert!(close(chart.weight_profile.primary, 0.5));

    let map = ev.evaluate(text, text, ElementKind::Map);
    assert!(close(map.combined_score, 0.9));

    let table = ev.evaluate(text, text, ElementKind::Table);
    assert!(close(table.combined_score, 0.3 * 1.0 + 0.7 * 0.8));
    assert!(close(table.weight_profile.secondary, 0.7));
}

#[test]
fn failing_primary_degrades_to_sequence_ratio() {
    let ev = Evaluator::new(&Evaluation::default()).with_primary(Down);
    let m = ev.evaluate("Same Text", "same text", ElementKind::Table);
    assert!(close(m.primary_score, 1.0));
    assert_eq!(m.details["primary_source"], "sequence_ratio");
    assert!(m.details.contains_key("primary_error"));
}

#[test]
fn failing_or_non_finite_secondary_scores_zero() {
    let text = "a table of monthly rainfall";
    let down = Evaluator::new(&Evaluation::default()).with_secondary(Down);
    let m = down.evaluate(text, text, ElementKind::Table);
    assert_eq!(m.secondary_score, 0.0);
    assert!(m.details.contains_key("secondary_error"));

    let nan = Evaluator::new(&Evaluation::default()).with_secondary(Fixed(f32::NAN));
    let m = nan.evaluate(text, text, ElementKind::Table);
    assert_eq!(m.secondary_score, 0.0);
    assert!(m.combined_score.is_finite());
}

#[test]
fn unknown_element_type_returns_zeroed_metrics() {
    let m = Evaluator::new(&Evaluation::default()).evaluate_raw("x", "y", "diagram");
    assert_eq!(m.primary_score, 0.0);
    assert_eq!(m.secondary_score, 0.0);
    assert_eq!(m.combined_score, 0.0);
    assert!(m.error().is_some_and(|e| e.contains("diagram")));
}

#[test]
fn batch_evaluate_is_per_item() {
    let ev = Evaluator::new(&Evaluation::default());
    let items = [
        ("a b c d", "a b c d", "chart"),
        ("x", "y", "nonsense"),
        ("", "ref", "MAP"),
    ];
    let out = ev.batch_evaluate(&items);
    assert_eq!(out.len(), 3);
    assert!(close(out[0].primary_score, 1.0));
    assert!(out[1].error().is_some());
    assert!(out[2].error().is_none());
}

#[test]
fn metrics_serialize_without_loss() {
    let ev = Evaluator::new(&Evaluation::default()).with_secondary(Fixed(0.4));
    let m = ev.evaluate("a wide map", "a map of the region", ElementKind::Map);
    let raw = serde_json::to_string(&m).expect("serialize");
    let back: docstage::evaluate::EvaluationMetrics =
        serde_json::from_str(&raw).expect("deserialize");
    assert_eq!(back, m);
}

#[test]
fn smoothed_bleu_is_small_but_positive_for_short_overlap() {
    let s = sentence_bleu("hello", "hello world");
    assert!(s > 0.0 && s < 0.1, "{s}");
    assert_eq!(sentence_bleu("alpha beta", "gamma delta"), 0.0);
    assert_eq!(sentence_bleu("", ""), 0.0);
}

#[test]
fn sequence_ratio_matches_longest_blocks() {
    let a: Vec<char> = "abcd".chars().collect();
    let b: Vec<char> = "bcde".chars().collect();
    assert!(close(sequence_ratio(&a, &b), 0.75));
    let empty: [char; 0] = [];
    assert_eq!(sequence_ratio(&empty, &empty), 1.0);
    assert!(close(char_ratio("  ABC ", "abc"), 1.0));
    assert_eq!(char_ratio("abc", "xyz"), 0.0);
}

use super::language::{Language, UNKNOWN_CODE};
use crate::error::MetricsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageScore {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageMetrics {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1_score: f32,
    /// `confusion_matrix[truth][predicted]`. Predictions outside the supported
    /// set are counted under `"unknown"`.
    pub confusion_matrix: BTreeMap<String, BTreeMap<String, u64>>,
    pub per_language: BTreeMap<String, LanguageScore>,
}

fn ratio(num: u64, den: u64) -> f32 {
    if den == 0 { 0.0 } else { num as f32 / den as f32 }
}

/// Accuracy plus macro-averaged precision, recall and F1 over the six
/// languages. Every language carries equal weight regardless of frequency;
/// a language with no predictions or no instances contributes 0 to the
/// corresponding average.
pub fn calculate_metrics<P: AsRef<str>, G: AsRef<str>>(
    predictions: &[P],
    ground_truth: &[G],
) -> Result<LanguageMetrics, MetricsError> {
    if predictions.len() != ground_truth.len() {
        return Err(MetricsError::LengthMismatch {
            predictions: predictions.len(),
            ground_truth: ground_truth.len(),
        });
    }

    let mut columns: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
    columns.push(UNKNOWN_CODE);
    let mut confusion: BTreeMap<String, BTreeMap<String, u64>> = Language::ALL
        .iter()
        .map(|truth| {
            let row = columns.iter().map(|c| (c.to_string(), 0u64)).collect();
            (truth.code().to_string(), row)
        })
        .collect();

    let mut correct = 0u64;
    let mut predicted: BTreeMap<Language, u64> = BTreeMap::new();
    let mut support: BTreeMap<Language, u64> = BTreeMap::new();
    let mut hits: BTreeMap<Language, u64> = BTreeMap::new();

    for (pred, truth) in predictions.iter().zip(ground_truth) {
        let (pred, truth) = (pred.as_ref().trim(), truth.as_ref().trim());
        if pred == truth {
            correct += 1;
        }
        let pred_lang = Language::from_code(pred);
        let truth_lang = Language::from_code(truth);
        if let Some(p) = pred_lang {
            *predicted.entry(p).or_insert(0) += 1;
        }
        if let Some(t) = truth_lang {
            *support.entry(t).or_insert(0) += 1;
            let column = pred_lang.map(|p| p.code()).unwrap_or(UNKNOWN_CODE);
            if let Some(cell) = confusion
                .get_mut(t.code())
                .and_then(|row| row.get_mut(column))
            {
                *cell += 1;
            }
            if pred_lang == Some(t) {
                *hits.entry(t).or_insert(0) += 1;
            }
        }
    }

    let mut per_language = BTreeMap::new();
    let (mut p_sum, mut r_sum, mut f_sum) = (0.0f32, 0.0f32, 0.0f32);
    for lang in Language::ALL {
        let tp = hits.get(&lang).copied().unwrap_or(0);
        let n_pred = predicted.get(&lang).copied().unwrap_or(0);
        let n_true = support.get(&lang).copied().unwrap_or(0);
        let precision = ratio(tp, n_pred);
        let recall = ratio(tp, n_true);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        p_sum += precision;
        r_sum += recall;
        f_sum += f1;
        per_language.insert(
            lang.code().to_string(),
            LanguageScore {
                precision,
                recall,
                f1,
                support: n_true,
            },
        );
    }

    let n = Language::ALL.len() as f32;
    Ok(LanguageMetrics {
        accuracy: ratio(correct, predictions.len() as u64),
        precision: p_sum / n,
        recall: r_sum / n,
        f1_score: f_sum / n,
        confusion_matrix: confusion,
        per_language,
    })
}

//! Pure-Rust surface similarity measures.
//!
//! [`sentence_bleu`] is smoothed so that short or disjoint strings score a
//! small finite number instead of failing on `ln(0)`. [`sequence_ratio`] is
//! the longest-matching-block ratio `2M / T`, used for the degraded
//! evaluation path and for CER/WER.

use crate::{engine::TextSimilarity, error::ProviderError};
use std::collections::HashMap;
use std::hash::Hash;

const MAX_ORDER: usize = 4;
const SMOOTHING_EPSILON: f64 = 0.1;

/// Sentence BLEU over lowercased whitespace tokens with uniform weights over
/// 1..=4-grams, brevity penalty, and additive-epsilon smoothing for orders
/// with no matches. Returns 0 when no unigram matches at all.
pub fn sentence_bleu(candidate: &str, reference: &str) -> f32 {
    let cand_lower = candidate.to_lowercase();
    let ref_lower = reference.to_lowercase();
    let cand: Vec<&str> = cand_lower.split_whitespace().collect();
    let refr: Vec<&str> = ref_lower.split_whitespace().collect();

    let mut log_sum = 0.0f64;
    for n in 1..=MAX_ORDER {
        let (matched, total) = clipped_matches(&cand, &refr, n);
        if n == 1 && matched == 0 {
            return 0.0;
        }
        let denominator = total.max(1) as f64;
        let precision = if matched == 0 {
            SMOOTHING_EPSILON / denominator
        } else {
            matched as f64 / denominator
        };
        log_sum += precision.ln() / MAX_ORDER as f64;
    }

    let (c, r) = (cand.len() as f64, refr.len() as f64);
    let brevity = if c > r { 1.0 } else { (1.0 - r / c).exp() };
    let score = brevity * log_sum.exp();
    if score.is_finite() { score.clamp(0.0, 1.0) as f32 } else { 0.0 }
}

/// Candidate n-grams matched against the reference with counts clipped to
/// the reference's, and the candidate's n-gram total.
fn clipped_matches(cand: &[&str], refr: &[&str], n: usize) -> (usize, usize) {
    let cand_counts = ngram_counts(cand, n);
    let ref_counts = ngram_counts(refr, n);
    let total = cand_counts.values().sum();
    let matched = cand_counts
        .iter()
        .map(|(g, c)| (*c).min(ref_counts.get(g).copied().unwrap_or(0)))
        .sum();
    (matched, total)
}

fn ngram_counts<'a>(tokens: &'a [&'a str], n: usize) -> HashMap<&'a [&'a str], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for w in tokens.windows(n) {
            *counts.entry(w).or_insert(0) += 1;
        }
    }
    counts
}

/// `2M / T` where `M` is the total size of the recursively found longest
/// matching blocks and `T` the combined length. Two empty inputs are
/// identical (1.0).
pub fn sequence_ratio<T: Eq + Hash>(a: &[T], b: &[T]) -> f32 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_size(a, b) as f32 / total as f32
}

/// Character-level ratio on lowercased, trimmed text.
pub fn char_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    sequence_ratio(&a, &b)
}

fn matching_size<T: Eq + Hash>(a: &[T], b: &[T]) -> usize {
    let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b2j.entry(item).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common run inside `a[alo..ahi]` x `b[blo..bhi]`; earliest in `a`
/// wins ties, then earliest in `b`.
fn longest_match<T: Eq + Hash>(
    a: &[T],
    b2j: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, item) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(js) = b2j.get(item) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|p| j2len.get(&p))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        j2len = next;
    }
    (best_i, best_j, best_k)
}

/// [`sentence_bleu`] behind the similarity seam.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothedBleu;

impl TextSimilarity for SmoothedBleu {
    fn label(&self) -> &str {
        "bleu"
    }

    fn similarity(&self, generated: &str, reference: &str) -> Result<f32, ProviderError> {
        Ok(sentence_bleu(generated, reference))
    }
}

use super::{
    language::{Language, UNKNOWN_CODE, UNKNOWN_NAME},
    strategy::{Ballot, StrategyKind},
};
use crate::util::unit_score;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub language_name: String,
    pub confidence: f32,
}

/// The ensemble's answer for one snippet.
///
/// `alternatives` is sorted by descending confidence, holds at most the
/// configured number of entries (3 by default), and never exceeds the
/// winner's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDecision {
    pub language_name: String,
    pub language_code: String,
    pub confidence: f32,
    pub alternatives: Vec<Alternative>,
    pub is_reliable: bool,
}

impl LanguageDecision {
    pub fn unknown() -> Self {
        Self {
            language_name: UNKNOWN_NAME.to_string(),
            language_code: UNKNOWN_CODE.to_string(),
            confidence: 0.0,
            alternatives: Vec::new(),
            is_reliable: false,
        }
    }

    /// Build a decision, enforcing the ordering and cap on alternatives.
    pub fn new(
        language: Language,
        confidence: f32,
        alternatives: impl IntoIterator<Item = (Language, f32)>,
        max_alternatives: usize,
        is_reliable: bool,
    ) -> Self {
        let confidence = unit_score(confidence);
        let mut alternatives: Vec<(Language, f32)> = alternatives
            .into_iter()
            .filter(|(l, _)| *l != language)
            .map(|(l, c)| (l, unit_score(c).min(confidence)))
            .collect();
        alternatives.sort_by(|a, b| b.1.total_cmp(&a.1));
        alternatives.truncate(max_alternatives);
        Self {
            language_name: language.name().to_string(),
            language_code: language.code().to_string(),
            confidence,
            alternatives: alternatives
                .into_iter()
                .map(|(l, c)| Alternative {
                    language_name: l.name().to_string(),
                    confidence: c,
                })
                .collect(),
            is_reliable,
        }
    }

    pub fn language(&self) -> Option<Language> {
        Language::from_code(&self.language_code)
    }

    pub fn is_unknown(&self) -> bool {
        self.language_code == UNKNOWN_CODE
    }
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    votes: usize,
    confidence_sum: f32,
    first_voter: StrategyKind,
}

impl Tally {
    fn mean(&self) -> f32 {
        self.confidence_sum / self.votes as f32
    }
}

/// Plurality reduction over reliable ballots.
///
/// Most votes wins; ties go to the higher accumulated confidence, then to the
/// language whose earliest voter has the higher strategy priority. Since each
/// strategy casts one ballot, that last key never ties, so the result is fully
/// determined by the ballots. Returns `None` for an empty slice.
pub fn reduce(
    ballots: &[Ballot],
    decision_threshold: f32,
    max_alternatives: usize,
) -> Option<LanguageDecision> {
    let mut tallies: BTreeMap<Language, Tally> = BTreeMap::new();
    for b in ballots {
        tallies
            .entry(b.vote.language)
            .and_modify(|t| {
                t.votes += 1;
                t.confidence_sum += b.vote.confidence;
                t.first_voter = t.first_voter.min(b.strategy);
            })
            .or_insert(Tally {
                votes: 1,
                confidence_sum: b.vote.confidence,
                first_voter: b.strategy,
            });
    }

    let (winner, tally) = tallies.iter().max_by(|(_, a), (_, b)| {
        a.votes
            .cmp(&b.votes)
            .then(a.confidence_sum.total_cmp(&b.confidence_sum))
            .then(b.first_voter.cmp(&a.first_voter))
    })?;
    let confidence = unit_score(tally.mean());

    let mut others: Vec<(&Language, &Tally)> =
        tallies.iter().filter(|(l, _)| *l != winner).collect();
    others.sort_by(|(_, a), (_, b)| {
        b.mean()
            .total_cmp(&a.mean())
            .then(a.first_voter.cmp(&b.first_voter))
    });

    Some(LanguageDecision::new(
        *winner,
        confidence,
        others.into_iter().map(|(l, t)| (*l, t.mean())),
        max_alternatives,
        confidence > decision_threshold,
    ))
}

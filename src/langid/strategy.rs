use super::language::{Language, Script};
use crate::{config::LangId, engine::LanguageClassifier, error::ProviderError, util::unit_score};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The four language-guessing strategies. Declaration order is the tie-break
/// priority: statistical > trigram > pattern > feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Statistical,
    Trigram,
    Pattern,
    Feature,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Statistical,
        StrategyKind::Trigram,
        StrategyKind::Pattern,
        StrategyKind::Feature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Statistical => "statistical",
            StrategyKind::Trigram => "trigram",
            StrategyKind::Pattern => "pattern",
            StrategyKind::Feature => "feature",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "statistical" | "langid" => Some(StrategyKind::Statistical),
            "trigram" | "langdetect" => Some(StrategyKind::Trigram),
            "pattern" => Some(StrategyKind::Pattern),
            "feature" => Some(StrategyKind::Feature),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's normalized opinion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanguageVote {
    pub language: Language,
    pub confidence: f32,
    pub is_reliable: bool,
}

/// A vote plus the strategy's own ranked runners-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Ballot {
    pub strategy: StrategyKind,
    pub vote: LanguageVote,
    pub runners_up: Vec<(Language, f32)>,
}

/// An `Err` means the strategy abstains; it is never counted as a zero vote.
pub trait LanguageStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn ballot(&self, text: &str) -> Result<Ballot, ProviderError>;
}

/// Pick the best of `scores` (canonical order wins exact ties) and rank the rest.
fn rank(
    scores: Vec<(Language, f32)>,
    min_alternative: f32,
    max_alternatives: usize,
) -> Option<((Language, f32), Vec<(Language, f32)>)> {
    let mut sorted = scores;
    // Stable sort keeps canonical order among equal scores.
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut iter = sorted.into_iter();
    let best = iter.next()?;
    let rest = iter
        .filter(|(_, s)| *s > min_alternative)
        .take(max_alternatives)
        .collect();
    Some((best, rest))
}

/// Character-range coverage. Needs no external resource, which makes it the
/// last resort when every other strategy abstains.
#[derive(Debug, Clone)]
pub struct PatternStrategy {
    threshold: f32,
    min_alternative: f32,
    max_alternatives: usize,
}

impl PatternStrategy {
    pub fn new(cfg: &LangId) -> Self {
        Self {
            threshold: cfg.pattern_threshold,
            min_alternative: cfg.min_alternative_score,
            max_alternatives: cfg.max_alternatives,
        }
    }

    /// Share of characters falling in each language's script range.
    pub fn coverage(text: &str) -> Vec<(Language, f32)> {
        let total = text.chars().count();
        if total == 0 {
            return Language::ALL.iter().map(|l| (*l, 0.0)).collect();
        }
        let count = |script: Script| text.chars().filter(|c| script.contains(*c)).count();
        let latin = count(Script::Latin);
        let devanagari = count(Script::Devanagari);
        let arabic = count(Script::Arabic);
        Language::ALL
            .iter()
            .map(|l| {
                let n = match l.script() {
                    Script::Latin => latin,
                    Script::Devanagari => devanagari,
                    Script::Arabic => arabic,
                };
                (*l, n as f32 / total as f32)
            })
            .collect()
    }
}

impl LanguageStrategy for PatternStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pattern
    }

    fn ballot(&self, text: &str) -> Result<Ballot, ProviderError> {
        let ((language, score), runners_up) = rank(
            Self::coverage(text),
            self.min_alternative,
            self.max_alternatives,
        )
        .ok_or(ProviderError::Empty)?;
        if score <= 0.0 {
            return Err(ProviderError::Empty);
        }
        Ok(Ballot {
            strategy: StrategyKind::Pattern,
            vote: LanguageVote {
                language,
                confidence: unit_score(score),
                is_reliable: score > self.threshold,
            },
            runners_up,
        })
    }
}

/// Common-word hits blended with closeness to a character-frequency profile.
#[derive(Debug, Clone)]
pub struct FeatureStrategy {
    word_weight: f32,
    char_weight: f32,
    threshold: f32,
    min_alternative: f32,
    max_alternatives: usize,
}

impl FeatureStrategy {
    pub fn new(cfg: &LangId) -> Self {
        Self {
            word_weight: cfg.feature_word_weight,
            char_weight: cfg.feature_char_weight,
            threshold: cfg.feature_threshold,
            min_alternative: cfg.min_alternative_score,
            max_alternatives: cfg.max_alternatives,
        }
    }

    pub fn scores(&self, text: &str) -> Vec<(Language, f32)> {
        let lowered = text.to_lowercase();
        let tokens: HashSet<&str> = lowered
            .split_whitespace()
            .map(|w| w.trim_matches(is_word_boundary))
            .filter(|w| !w.is_empty())
            .collect();

        let mut char_counts: HashMap<char, usize> = HashMap::new();
        let mut total = 0usize;
        for c in lowered.chars() {
            *char_counts.entry(c).or_insert(0) += 1;
            total += 1;
        }

        Language::ALL
            .iter()
            .map(|lang| {
                let words = lang.common_words();
                let hits = words.iter().filter(|w| tokens.contains(**w)).count();
                let word_score = hits as f32 / words.len() as f32;

                let profile = lang.char_profile();
                let char_score = if total == 0 {
                    0.0
                } else {
                    let sum: f32 = profile
                        .iter()
                        .map(|(c, expected)| {
                            let actual =
                                char_counts.get(c).copied().unwrap_or(0) as f32 / total as f32;
                            1.0 - (expected - actual).abs()
                        })
                        .sum();
                    sum / profile.len() as f32
                };

                (
                    *lang,
                    word_score * self.word_weight + char_score * self.char_weight,
                )
            })
            .collect()
    }
}

fn is_word_boundary(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '،' | '؛' | '؟' | '۔' | '।' | '॥' | '“' | '”')
}

impl LanguageStrategy for FeatureStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Feature
    }

    fn ballot(&self, text: &str) -> Result<Ballot, ProviderError> {
        let ((language, score), runners_up) =
            rank(self.scores(text), self.min_alternative, self.max_alternatives)
                .ok_or(ProviderError::Empty)?;
        Ok(Ballot {
            strategy: StrategyKind::Feature,
            vote: LanguageVote {
                language,
                confidence: unit_score(score),
                is_reliable: score > self.threshold,
            },
            runners_up,
        })
    }
}

/// Wraps an external classifier as either the statistical strategy (trusts
/// the classifier's top guess) or the trigram strategy (best supported guess
/// anywhere in the ranking).
pub struct ClassifierStrategy {
    kind: StrategyKind,
    classifier: Box<dyn LanguageClassifier>,
    threshold: f32,
    alias_threshold: f32,
    alias_factor: f32,
    max_alternatives: usize,
}

impl ClassifierStrategy {
    pub fn statistical(cfg: &LangId, classifier: impl LanguageClassifier + 'static) -> Self {
        Self::with_kind(StrategyKind::Statistical, cfg.statistical_threshold, cfg, classifier)
    }

    pub fn trigram(cfg: &LangId, classifier: impl LanguageClassifier + 'static) -> Self {
        Self::with_kind(StrategyKind::Trigram, cfg.trigram_threshold, cfg, classifier)
    }

    fn with_kind(
        kind: StrategyKind,
        threshold: f32,
        cfg: &LangId,
        classifier: impl LanguageClassifier + 'static,
    ) -> Self {
        Self {
            kind,
            classifier: Box::new(classifier),
            threshold,
            alias_threshold: cfg.alias_threshold,
            alias_factor: cfg.alias_confidence_factor,
            max_alternatives: cfg.max_alternatives,
        }
    }

    /// Normalize one raw guess. Exact codes keep their probability; aliases
    /// are discounted and held to a stricter reliability bar.
    fn normalize(&self, code: &str, prob: f32) -> Option<LanguageVote> {
        let prob = unit_score(prob);
        if let Some(language) = Language::from_code(code) {
            return Some(LanguageVote {
                language,
                confidence: prob,
                is_reliable: prob > self.threshold,
            });
        }
        Language::from_alias(code).map(|language| LanguageVote {
            language,
            confidence: prob * self.alias_factor,
            is_reliable: prob > self.alias_threshold,
        })
    }
}

impl LanguageStrategy for ClassifierStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn ballot(&self, text: &str) -> Result<Ballot, ProviderError> {
        let raw = self.classifier.classify(text)?;
        let (first_code, _) = raw.first().ok_or(ProviderError::Empty)?;

        let mut supported: Vec<LanguageVote> = match self.kind {
            StrategyKind::Statistical => raw
                .iter()
                .take(1)
                .filter_map(|(code, p)| self.normalize(code, *p))
                .collect(),
            _ => raw
                .iter()
                .filter_map(|(code, p)| self.normalize(code, *p))
                .collect(),
        };
        if supported.is_empty() {
            return Err(ProviderError::Unsupported(format!(
                "{} guessed unsupported language {first_code}",
                self.classifier.label()
            )));
        }
        supported.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let vote = supported[0];
        let mut seen = HashSet::from([vote.language]);
        let runners_up = supported[1..]
            .iter()
            .filter(|v| seen.insert(v.language))
            .map(|v| (v.language, v.confidence))
            .take(self.max_alternatives)
            .collect();

        Ok(Ballot {
            strategy: self.kind,
            vote,
            runners_up,
        })
    }
}

//! Ensemble language identification over English, Hindi, Urdu, Arabic,
//! Nepali and Persian.
//!
//! Up to four independent strategies each cast a [`Ballot`]. Abstentions
//! and unreliable votes are discarded, the rest are reduced by plurality
//! (see [`ensemble::reduce`]). When nothing reliable remains, the
//! character-range pattern strategy decides alone and the result is flagged
//! unreliable.
//!
//! Urdu, Arabic and Persian share one Unicode block, as do Hindi and Nepali,
//! so the pattern strategy cannot separate them; that job falls to the
//! feature strategy's word lists and to the external classifiers.

pub mod ensemble;
pub mod language;
pub mod metrics;
pub mod strategy;

pub use ensemble::{Alternative, LanguageDecision};
pub use language::Language;
pub use metrics::{calculate_metrics, LanguageMetrics, LanguageScore};
pub use strategy::{
    Ballot, ClassifierStrategy, FeatureStrategy, LanguageStrategy, LanguageVote, PatternStrategy,
    StrategyKind,
};

use crate::{config::LangId, engine::LanguageClassifier, error::MetricsError};
use tracing::{debug, warn};

pub struct LanguageIdentifier {
    cfg: LangId,
    defaults: Vec<StrategyKind>,
    strategies: Vec<Box<dyn LanguageStrategy>>,
    pattern: PatternStrategy,
}

impl LanguageIdentifier {
    /// An identifier with the built-in pattern and feature strategies. The
    /// two classifier-backed strategies abstain until one is attached.
    pub fn new(cfg: &LangId) -> Self {
        let mut defaults: Vec<StrategyKind> = Vec::new();
        for raw in &cfg.strategies {
            match StrategyKind::parse(raw) {
                Some(k) if !defaults.contains(&k) => defaults.push(k),
                Some(_) => {}
                None => warn!("ignoring unknown language strategy: {raw}"),
            }
        }
        if defaults.is_empty() {
            defaults = StrategyKind::ALL.to_vec();
        }

        Self {
            cfg: cfg.clone(),
            defaults,
            strategies: Vec::new(),
            pattern: PatternStrategy::new(cfg),
        }
        .with_strategy(PatternStrategy::new(cfg))
        .with_strategy(FeatureStrategy::new(cfg))
    }

    /// Attach a strategy, replacing any existing one of the same kind.
    pub fn with_strategy(mut self, strategy: impl LanguageStrategy + 'static) -> Self {
        self.strategies.retain(|s| s.kind() != strategy.kind());
        self.strategies.push(Box::new(strategy));
        self.strategies.sort_by_key(|s| s.kind());
        self
    }

    pub fn with_statistical(self, classifier: impl LanguageClassifier + 'static) -> Self {
        let s = ClassifierStrategy::statistical(&self.cfg, classifier);
        self.with_strategy(s)
    }

    pub fn with_trigram(self, classifier: impl LanguageClassifier + 'static) -> Self {
        let s = ClassifierStrategy::trigram(&self.cfg, classifier);
        self.with_strategy(s)
    }

    pub fn available(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Ensemble detection over the configured strategies.
    pub fn detect(&self, text: &str) -> LanguageDecision {
        self.detect_with(text, &self.defaults)
    }

    /// Ensemble detection over a subset of strategies. Strategies always run
    /// in priority order, whatever the order of `kinds`.
    pub fn detect_with(&self, text: &str, kinds: &[StrategyKind]) -> LanguageDecision {
        if text.trim().is_empty() {
            return LanguageDecision::unknown();
        }

        let mut reliable = Vec::new();
        for strategy in self.strategies.iter().filter(|s| kinds.contains(&s.kind())) {
            match strategy.ballot(text) {
                Ok(b) if b.vote.is_reliable => reliable.push(b),
                Ok(b) => debug!(
                    strategy = %b.strategy,
                    language = b.vote.language.code(),
                    confidence = b.vote.confidence,
                    "discarding unreliable vote"
                ),
                Err(err) => debug!(strategy = %strategy.kind(), "strategy abstained: {err}"),
            }
        }

        match ensemble::reduce(&reliable, self.cfg.decision_threshold, self.cfg.max_alternatives)
        {
            Some(decision) => decision,
            None => {
                debug!("no reliable votes; using pattern fallback");
                self.pattern_fallback(text)
            }
        }
    }

    /// One strategy's own verdict, judged by its own reliability threshold.
    /// A failing strategy degrades to the pattern fallback.
    pub fn detect_single(&self, text: &str, kind: StrategyKind) -> LanguageDecision {
        if text.trim().is_empty() {
            return LanguageDecision::unknown();
        }
        let ballot = self
            .strategies
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.ballot(text));
        match ballot {
            Some(Ok(b)) => LanguageDecision::new(
                b.vote.language,
                b.vote.confidence,
                b.runners_up,
                self.cfg.max_alternatives,
                b.vote.is_reliable,
            ),
            Some(Err(err)) => {
                debug!(strategy = %kind, "strategy failed: {err}");
                self.pattern_fallback(text)
            }
            None => self.pattern_fallback(text),
        }
    }

    /// Results in input order, each item independent of the others.
    pub fn batch_detect<S: AsRef<str>>(&self, texts: &[S]) -> Vec<LanguageDecision> {
        texts.iter().map(|t| self.detect(t.as_ref())).collect()
    }

    pub fn calculate_metrics<P: AsRef<str>, G: AsRef<str>>(
        &self,
        predictions: &[P],
        ground_truth: &[G],
    ) -> Result<LanguageMetrics, MetricsError> {
        calculate_metrics(predictions, ground_truth)
    }

    fn pattern_fallback(&self, text: &str) -> LanguageDecision {
        match self.pattern.ballot(text) {
            Ok(b) => LanguageDecision::new(
                b.vote.language,
                b.vote.confidence,
                b.runners_up,
                self.cfg.max_alternatives,
                false,
            ),
            Err(_) => LanguageDecision::unknown(),
        }
    }
}

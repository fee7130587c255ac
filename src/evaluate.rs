use crate::{
    config::Evaluation,
    engine::{ElementKind, TextSimilarity},
    error::ProviderError,
    policy::{weight_profile, WeightProfile},
    textsim::{char_ratio, SmoothedBleu},
    util::unit_score,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub primary_score: f32,
    pub secondary_score: f32,
    pub combined_score: f32,
    pub weight_profile: WeightProfile,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl EvaluationMetrics {
    fn failed(weight_profile: WeightProfile, error: impl Into<String>) -> Self {
        Self {
            primary_score: 0.0,
            secondary_score: 0.0,
            combined_score: 0.0,
            weight_profile,
            details: BTreeMap::from([("error".to_string(), Value::String(error.into()))]),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

/// Scores generated descriptions against references.
///
/// The primary scorer degrades to a character-sequence ratio when it fails.
/// The secondary (semantic) scorer has no cheap stand-in, so a missing or
/// failing one contributes 0.
pub struct Evaluator {
    cfg: Evaluation,
    primary: Box<dyn TextSimilarity>,
    secondary: Option<Box<dyn TextSimilarity>>,
}

impl Evaluator {
    pub fn new(cfg: &Evaluation) -> Self {
        Self {
            cfg: cfg.clone(),
            primary: Box::new(SmoothedBleu),
            secondary: None,
        }
    }

    pub fn with_primary(mut self, scorer: impl TextSimilarity + 'static) -> Self {
        self.primary = Box::new(scorer);
        self
    }

    pub fn with_secondary(mut self, scorer: impl TextSimilarity + 'static) -> Self {
        self.secondary = Some(Box::new(scorer));
        self
    }

    pub fn set_secondary(&mut self, scorer: Option<Box<dyn TextSimilarity>>) {
        self.secondary = scorer;
    }

    pub fn evaluate(&self, generated: &str, reference: &str, kind: ElementKind) -> EvaluationMetrics {
        let profile = weight_profile(&self.cfg, kind);
        let mut details = BTreeMap::new();
        details.insert("element_type".to_string(), json!(kind.as_str()));
        details.insert("generated_length".to_string(), json!(generated.chars().count()));
        details.insert("reference_length".to_string(), json!(reference.chars().count()));

        let primary = match finite(self.primary.similarity(generated, reference)) {
            Ok(v) => {
                details.insert("primary_source".to_string(), json!(self.primary.label()));
                v
            }
            Err(err) => {
                warn!("primary scorer {} failed; using sequence ratio: {err}", self.primary.label());
                details.insert("primary_source".to_string(), json!("sequence_ratio"));
                details.insert("primary_error".to_string(), json!(err.to_string()));
                char_ratio(generated, reference)
            }
        };

        let secondary = match &self.secondary {
            Some(scorer) => match finite(scorer.similarity(generated, reference)) {
                Ok(v) => {
                    details.insert("secondary_source".to_string(), json!(scorer.label()));
                    v
                }
                Err(err) => {
                    warn!("secondary scorer {} failed; scoring 0: {err}", scorer.label());
                    details.insert("secondary_source".to_string(), json!("unavailable"));
                    details.insert("secondary_error".to_string(), json!(err.to_string()));
                    0.0
                }
            },
            None => {
                details.insert("secondary_source".to_string(), json!("unavailable"));
                0.0
            }
        };

        let (primary, secondary) = (unit_score(primary), unit_score(secondary));
        let combined = profile.blend(primary, secondary);
        if !combined.is_finite() {
            return EvaluationMetrics::failed(profile, "combined score is not finite");
        }

        EvaluationMetrics {
            primary_score: primary,
            secondary_score: secondary,
            combined_score: unit_score(combined),
            weight_profile: profile,
            details,
        }
    }

    /// Like [`Evaluator::evaluate`] with the element type given as text. An
    /// unrecognized type yields zero scores and an `error` detail.
    pub fn evaluate_raw(&self, generated: &str, reference: &str, element_type: &str) -> EvaluationMetrics {
        match ElementKind::parse(element_type) {
            Some(kind) => self.evaluate(generated, reference, kind),
            None => EvaluationMetrics::failed(
                WeightProfile::normalized(0.0, 0.0),
                format!("unknown element type: {element_type}"),
            ),
        }
    }

    /// Evaluate `(generated, reference, element_type)` triples in order.
    pub fn batch_evaluate<G, R, K>(&self, items: &[(G, R, K)]) -> Vec<EvaluationMetrics>
    where
        G: AsRef<str>,
        R: AsRef<str>,
        K: AsRef<str>,
    {
        items
            .iter()
            .map(|(g, r, k)| self.evaluate_raw(g.as_ref(), r.as_ref(), k.as_ref()))
            .collect()
    }
}

fn finite(score: Result<f32, ProviderError>) -> Result<f32, ProviderError> {
    match score {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(v) => Err(ProviderError::Unsupported(format!("non-finite score {v}"))),
        Err(e) => Err(e),
    }
}

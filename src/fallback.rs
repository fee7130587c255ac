//! Ordered provider chains that always resolve.
//!
//! A [`FallbackChain`] tries each provider in declared order and returns the
//! first success, tagged with that provider's label. When every provider
//! fails (or there are none), the terminal [`Template`] produces a value that
//! is returned with `source_label = "template"` and a fixed low confidence.
//! `resolve` never fails, so callers need no error handling around inference.

use crate::{error::ProviderError, util::unit_score};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const TEMPLATE_LABEL: &str = "template";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<T> {
    pub value: T,
    pub confidence: f32,
    pub source_label: String,
}

impl<T> Candidate<T> {
    pub fn is_template(&self) -> bool {
        self.source_label == TEMPLATE_LABEL
    }
}

/// What a provider hands back before the chain labels it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub value: T,
    pub confidence: f32,
}

impl<T> Scored<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence }
    }
}

pub trait Provider<I: ?Sized, T>: Send + Sync {
    fn label(&self) -> &str;
    fn provide(&self, input: &I) -> Result<Scored<T>, ProviderError>;
}

/// The terminal link. Must not fail.
pub trait Template<I: ?Sized, T>: Send + Sync {
    fn produce(&self, input: &I) -> T;
}

impl<I: ?Sized, T, F> Template<I, T> for F
where
    F: Fn(&I) -> T + Send + Sync,
{
    fn produce(&self, input: &I) -> T {
        self(input)
    }
}

/// Adapts a closure into a labelled provider.
pub struct FnProvider<F> {
    label: String,
    f: F,
}

impl<F> FnProvider<F> {
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }
}

impl<I: ?Sized, T, F> Provider<I, T> for FnProvider<F>
where
    F: Fn(&I) -> Result<Scored<T>, ProviderError> + Send + Sync,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn provide(&self, input: &I) -> Result<Scored<T>, ProviderError> {
        (self.f)(input)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub label: String,
    pub error: String,
}

/// A resolved candidate plus the failures that preceded it.
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    pub candidate: Candidate<T>,
    pub failures: Vec<ProviderFailure>,
}

impl<T> Resolution<T> {
    pub fn degraded(&self) -> bool {
        self.candidate.is_template()
    }
}

pub struct FallbackChain<I: ?Sized, T> {
    name: String,
    providers: Vec<Box<dyn Provider<I, T>>>,
    template: Box<dyn Template<I, T>>,
    template_confidence: f32,
}

impl<I: ?Sized, T> FallbackChain<I, T> {
    pub fn new(
        name: impl Into<String>,
        template: impl Template<I, T> + 'static,
        template_confidence: f32,
    ) -> Self {
        Self {
            name: name.into(),
            providers: Vec::new(),
            template: Box::new(template),
            template_confidence: unit_score(template_confidence),
        }
    }

    pub fn with_provider(mut self, provider: impl Provider<I, T> + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn push(&mut self, provider: Box<dyn Provider<I, T>>) {
        self.providers.push(provider);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.label()).collect()
    }

    pub fn resolve(&self, input: &I) -> Candidate<T> {
        self.resolve_traced(input).candidate
    }

    pub fn resolve_traced(&self, input: &I) -> Resolution<T> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.provide(input) {
                Ok(scored) => {
                    debug!(chain = %self.name, provider = provider.label(), "provider succeeded");
                    return Resolution {
                        candidate: Candidate {
                            value: scored.value,
                            confidence: unit_score(scored.confidence),
                            source_label: provider.label().to_string(),
                        },
                        failures,
                    };
                }
                Err(err) => {
                    warn!(
                        "{} provider {} failed; trying next link: {}",
                        self.name,
                        provider.label(),
                        err
                    );
                    failures.push(ProviderFailure {
                        label: provider.label().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        debug!(chain = %self.name, failed = failures.len(), "using template");
        Resolution {
            candidate: Candidate {
                value: self.template.produce(input),
                confidence: self.template_confidence,
                source_label: TEMPLATE_LABEL.to_string(),
            },
            failures,
        }
    }
}

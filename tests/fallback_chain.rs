use docstage::{
    error::ProviderError,
    fallback::{FallbackChain, FnProvider, Scored, TEMPLATE_LABEL},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn failing(label: &str) -> FnProvider<impl Fn(&str) -> Result<Scored<String>, ProviderError>> {
    FnProvider::new(label, |_: &str| {
        Err(ProviderError::Unavailable("model not installed".into()))
    })
}

fn chain() -> FallbackChain<str, String> {
    FallbackChain::new("test", |input: &str| format!("template:{input}"), 0.5)
}

#[test]
fn all_failing_providers_resolve_to_template() {
    let chain = chain()
        .with_provider(failing("primary"))
        .with_provider(failing("secondary"));

    for input in ["", "a", "some longer input"] {
        let res = chain.resolve_traced(input);
        assert_eq!(res.candidate.source_label, TEMPLATE_LABEL);
        assert_eq!(res.candidate.value, format!("template:{input}"));
        assert_eq!(res.candidate.confidence, 0.5);
        assert!(res.degraded());
        assert_eq!(res.failures.len(), 2);
        assert_eq!(res.failures[0].label, "primary");
        assert_eq!(res.failures[1].label, "secondary");
    }
}

#[test]
fn empty_chain_resolves_to_template() {
    let c = chain().resolve("x");
    assert!(c.is_template());
    assert_eq!(c.value, "template:x");
}

#[test]
fn first_success_wins_and_later_providers_are_not_called() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let chain = chain()
        .with_provider(failing("primary"))
        .with_provider(FnProvider::new("secondary", |input: &str| {
            Ok(Scored::new(input.to_uppercase(), 0.9))
        }))
        .with_provider(FnProvider::new("tertiary", move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Scored::new("never".to_string(), 1.0))
        }));

    let res = chain.resolve_traced("hello");
    assert_eq!(res.candidate.value, "HELLO");
    assert_eq!(res.candidate.source_label, "secondary");
    assert_eq!(res.candidate.confidence, 0.9);
    assert!(!res.degraded());
    assert_eq!(res.failures.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn provider_confidence_is_clamped() {
    let chain = chain()
        .with_provider(FnProvider::new("wild", |_: &str| {
            Ok(Scored::new("v".to_string(), f32::NAN))
        }));
    assert_eq!(chain.resolve("x").confidence, 0.0);

    let chain = FallbackChain::<str, String>::new("t", |_: &str| String::new(), 7.0)
        .with_provider(FnProvider::new("big", |_: &str| {
            Ok(Scored::new("v".to_string(), 3.0))
        }));
    assert_eq!(chain.resolve("x").confidence, 1.0);
}

#[test]
fn labels_follow_declared_order() {
    let chain = chain()
        .with_provider(failing("a"))
        .with_provider(failing("b"));
    assert_eq!(chain.labels(), vec!["a", "b"]);
    assert_eq!(chain.name(), "test");
}

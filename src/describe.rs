use crate::{
    config::{Config, Describe},
    engine::{ElementKind, RegionImage, VisionGenerator},
    error::ProviderError,
    fallback::{Candidate, FallbackChain, Provider, Resolution, Scored},
};
use tracing::debug;

/// A cropped non-text region and what the layout detector called it.
#[derive(Debug, Clone)]
pub struct VisualElement {
    pub region: RegionImage,
    pub kind: ElementKind,
}

/// Visual-to-text fallback chain. The aspect-ratio template is the final link,
/// so a description is always produced.
pub struct Describer {
    chain: FallbackChain<VisualElement, String>,
}

impl Describer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            chain: FallbackChain::new(
                "describe",
                |el: &VisualElement| template_description(el.kind, el.region.aspect_ratio()),
                cfg.fallback.template_confidence,
            ),
        }
    }

    pub fn with_generator(mut self, cfg: &Describe, generator: impl VisionGenerator + 'static) -> Self {
        self.push_generator(cfg, Box::new(generator));
        self
    }

    pub fn push_generator(&mut self, cfg: &Describe, generator: Box<dyn VisionGenerator>) {
        self.chain.push(Box::new(GeneratorLink {
            generator,
            cfg: cfg.clone(),
        }));
    }

    pub fn labels(&self) -> Vec<&str> {
        self.chain.labels()
    }

    pub fn describe(&self, element: &VisualElement) -> Candidate<String> {
        self.chain.resolve(element)
    }

    pub fn describe_traced(&self, element: &VisualElement) -> Resolution<String> {
        self.chain.resolve_traced(element)
    }

    pub fn batch_describe(&self, elements: &[VisualElement]) -> Vec<Candidate<String>> {
        elements.iter().map(|e| self.describe(e)).collect()
    }
}

struct GeneratorLink {
    generator: Box<dyn VisionGenerator>,
    cfg: Describe,
}

impl Provider<VisualElement, String> for GeneratorLink {
    fn label(&self) -> &str {
        self.generator.label()
    }

    fn provide(&self, element: &VisualElement) -> Result<Scored<String>, ProviderError> {
        let raw = self.generator.generate(&element.region, element.kind)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProviderError::Empty);
        }
        let text = if self.cfg.enhance {
            enhance(element.kind, raw)
        } else {
            raw.to_string()
        };
        debug!(generator = self.generator.label(), kind = %element.kind, "generated description");
        Ok(Scored::new(text, self.cfg.generator_confidence))
    }
}

/// Frame raw generator output for its element kind. Figures pass through.
pub fn enhance(kind: ElementKind, text: &str) -> String {
    let (subjects, opener, keywords, closer): (&[&str], &str, &[&str], &str) = match kind {
        ElementKind::Chart => (
            &["chart", "graph"],
            "This chart shows",
            &["data", "values", "trend", "increase", "decrease", "percentage"],
            "The visualization provides a clear representation of the data.",
        ),
        ElementKind::Map => (
            &["map", "location"],
            "This map displays",
            &["area", "region", "location", "geographic", "spatial"],
            "The map provides spatial information about the depicted area.",
        ),
        ElementKind::Table => (
            &["table"],
            "This table contains",
            &["data", "information", "rows", "columns", "entries"],
            "The table presents structured information in an organized format.",
        ),
        ElementKind::Figure => return text.to_string(),
    };

    let lowered = text.to_lowercase();
    let mut out = if subjects.iter().any(|s| lowered.contains(s)) {
        text.to_string()
    } else {
        format!("{opener} {lowered}")
    };
    let lowered = out.to_lowercase();
    if keywords.iter().any(|k| lowered.contains(k)) {
        out.push_str(". ");
        out.push_str(closer);
    }
    out
}

/// Deterministic description chosen from the region's width/height ratio.
pub fn template_description(kind: ElementKind, aspect_ratio: f32) -> String {
    let ar = if aspect_ratio.is_finite() { aspect_ratio } else { 1.0 };
    let s = match kind {
        ElementKind::Chart if ar > 1.5 => {
            "This is a wide chart displaying data in a horizontal format."
        }
        ElementKind::Chart if ar < 0.7 => "This is a tall chart displaying data in a vertical format.",
        ElementKind::Chart => "This is a chart displaying data with balanced proportions.",
        ElementKind::Map if ar > 1.2 => {
            "This is a wide map showing geographic information in landscape orientation."
        }
        ElementKind::Map if ar < 0.8 => {
            "This is a tall map showing geographic information in portrait orientation."
        }
        ElementKind::Map => "This is a map showing geographic information with balanced proportions.",
        ElementKind::Table if ar > 1.5 => {
            "This is a wide table with many columns displaying structured data."
        }
        ElementKind::Table if ar < 0.7 => {
            "This is a tall table with many rows displaying structured data."
        }
        ElementKind::Table => "This is a table displaying structured data in a balanced format.",
        ElementKind::Figure => {
            return format!("This is a {kind} element displaying visual information.");
        }
    };
    s.to_string()
}

pub mod python;
pub mod types;

use crate::error::ProviderError;

pub use types::{BBox, ElementKind, LayoutBox, LayoutClass, OcrLine, Page, RegionImage};

// Capability seams for the external models. The decision logic in this crate
// only ever sees these traits, never a concrete model.

pub trait LayoutDetector: Send + Sync {
    fn label(&self) -> &str;
    fn detect(&self, page: &Page) -> Result<Vec<LayoutBox>, ProviderError>;
}

pub trait OcrReader: Send + Sync {
    fn label(&self) -> &str;
    fn read(&self, region: &RegionImage) -> Result<Vec<OcrLine>, ProviderError>;
}

pub trait VisionGenerator: Send + Sync {
    fn label(&self) -> &str;
    fn generate(&self, region: &RegionImage, kind: ElementKind) -> Result<String, ProviderError>;
}

/// Returns raw `(code, probability)` guesses, best first. Codes may fall
/// outside the supported set.
pub trait LanguageClassifier: Send + Sync {
    fn label(&self) -> &str;
    fn classify(&self, text: &str) -> Result<Vec<(String, f32)>, ProviderError>;
}

pub trait TextSimilarity: Send + Sync {
    fn label(&self) -> &str;
    fn similarity(&self, generated: &str, reference: &str) -> Result<f32, ProviderError>;
}

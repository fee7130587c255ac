use docstage::{
    config::Config,
    describe::{enhance, template_description, Describer, VisualElement},
    engine::{BBox, ElementKind, RegionImage, VisionGenerator},
    error::ProviderError,
};
use image::RgbImage;

struct Says(&'static str);

impl VisionGenerator for Says {
    fn label(&self) -> &str {
        "vlm"
    }

    fn generate(&self, _region: &RegionImage, _kind: ElementKind) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

struct Crashes;

impl VisionGenerator for Crashes {
    fn label(&self) -> &str {
        "crashes"
    }

    fn generate(&self, _region: &RegionImage, _kind: ElementKind) -> Result<String, ProviderError> {
        Err(ProviderError::Inference("CUDA out of memory".into()))
    }
}

fn element(kind: ElementKind, w: u32, h: u32) -> VisualElement {
    VisualElement {
        region: RegionImage {
            bbox: BBox::new(0.0, 0.0, w as f32, h as f32),
            image: RgbImage::new(w, h),
        },
        kind,
    }
}

#[test]
fn enhancement_adds_kind_specific_framing() {
    assert_eq!(
        enhance(ElementKind::Chart, "Sales by quarter"),
        "This chart shows sales by quarter"
    );
    assert_eq!(
        enhance(ElementKind::Chart, "Sales data rising"),
        "This chart shows sales data rising. The visualization provides a clear representation of the data."
    );
    assert_eq!(enhance(ElementKind::Chart, "A bar graph"), "A bar graph");
    assert_eq!(
        enhance(ElementKind::Map, "roads near the river"),
        "This map displays roads near the river"
    );
    assert_eq!(
        enhance(ElementKind::Table, "Rows of prices"),
        "This table contains rows of prices. The table presents structured information in an organized format."
    );
    assert_eq!(enhance(ElementKind::Figure, "A cat"), "A cat");
}

#[test]
fn templates_depend_on_aspect_ratio() {
    assert!(template_description(ElementKind::Chart, 2.0).contains("wide chart"));
    assert!(template_description(ElementKind::Chart, 0.5).contains("tall chart"));
    assert!(template_description(ElementKind::Chart, 1.0).contains("balanced"));
    assert!(template_description(ElementKind::Map, 1.3).contains("landscape"));
    assert!(template_description(ElementKind::Map, 0.7).contains("portrait"));
    assert!(template_description(ElementKind::Table, 1.3).contains("balanced"));
    assert!(template_description(ElementKind::Table, 1.6).contains("many columns"));
    assert!(template_description(ElementKind::Table, f32::NAN).contains("balanced"));
    assert_eq!(
        template_description(ElementKind::Figure, 3.0),
        "This is a figure element displaying visual information."
    );
}

#[test]
fn generator_output_is_enhanced_and_labelled() {
    let cfg = Config::default();
    let d = Describer::new(&cfg).with_generator(&cfg.describe, Says("monthly values"));
    let c = d.describe(&element(ElementKind::Chart, 200, 100));
    assert_eq!(c.source_label, "vlm");
    assert_eq!(c.confidence, 0.8);
    assert!(c.value.starts_with("This chart shows monthly values"));
}

#[test]
fn failing_or_blank_generators_fall_back_to_template() {
    let cfg = Config::default();
    let d = Describer::new(&cfg)
        .with_generator(&cfg.describe, Crashes)
        .with_generator(&cfg.describe, Says("   "));

    let res = d.describe_traced(&element(ElementKind::Table, 100, 300));
    assert!(res.degraded());
    assert_eq!(res.failures.len(), 2);
    assert_eq!(res.candidate.confidence, 0.5);
    assert!(res.candidate.value.contains("tall table"));
}

#[test]
fn describer_without_generators_still_describes() {
    let cfg = Config::default();
    let d = Describer::new(&cfg);
    let out = d.batch_describe(&[
        element(ElementKind::Map, 300, 100),
        element(ElementKind::Figure, 10, 10),
    ]);
    assert!(out[0].value.contains("wide map"));
    assert!(out[1].value.contains("figure element"));
    assert!(out.iter().all(|c| c.is_template()));
}

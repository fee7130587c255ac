//! Staged page processing.
//!
//! Each stage is a separate type that can only be built by consuming the one
//! before it, so stage 2 reuses stage 1's element list and stage 3 reuses
//! both, with no way to rerun earlier work.

use crate::{
    config::Config,
    describe::{Describer, VisualElement},
    engine::{
        python::{PythonEngine, ScriptProvider},
        BBox, ElementKind, LayoutBox, LayoutClass, LayoutDetector, OcrReader, Page,
        VisionGenerator,
    },
    error::ProviderError,
    fallback::{FallbackChain, Provider, Scored},
    langid::{LanguageIdentifier, StrategyKind},
    ocr::TextReader,
    policy::Stage,
    probe,
    report::{DescribedRegion, LabeledTextRegion, LayoutElement, PageOutput, Size},
    util::unit_score,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct LayoutStage {
    pub elements: Vec<LayoutElement>,
    pub warnings: Vec<String>,
}

pub struct TextStage {
    pub layout: LayoutStage,
    pub text_lines: Vec<LabeledTextRegion>,
    /// Every line's text in reading order, space-joined.
    pub overall_text: String,
    /// Distinct identified languages in order of first appearance.
    pub detected_languages: Vec<String>,
}

pub struct SemanticStage {
    pub text: TextStage,
    pub tables: Vec<DescribedRegion>,
    pub figures: Vec<DescribedRegion>,
    pub charts: Vec<DescribedRegion>,
    pub maps: Vec<DescribedRegion>,
}

pub struct Pipeline {
    cfg: Config,
    layout: FallbackChain<Page, Vec<LayoutBox>>,
    reader: TextReader,
    langid: LanguageIdentifier,
    describer: Describer,
}

impl Pipeline {
    /// A pipeline with no model providers: every chain resolves to its
    /// template and language identification uses the built-in strategies.
    pub fn new(cfg: &Config) -> Self {
        let class = cfg.layout.template_class.clone();
        let confidence = cfg.fallback.template_confidence;
        let layout = FallbackChain::new(
            "layout",
            move |page: &Page| {
                vec![LayoutBox {
                    bbox: page.full_bbox(),
                    cls: class.clone(),
                    score: confidence,
                }]
            },
            confidence,
        );
        Self {
            cfg: cfg.clone(),
            layout,
            reader: TextReader::new(cfg),
            langid: LanguageIdentifier::new(&cfg.langid),
            describer: Describer::new(cfg),
        }
    }

    /// Wire the script-backed providers named in `[engine]`.
    pub fn from_engine(cfg: &Config, engine: &Arc<PythonEngine>) -> Self {
        let mut pipeline = Self::new(cfg);
        for name in &cfg.engine.layout_providers {
            pipeline.push_detector(Box::new(ScriptProvider::new(engine, name)));
        }
        for name in &cfg.engine.ocr_providers {
            pipeline
                .reader
                .push_reader(&cfg.ocr, Box::new(ScriptProvider::new(engine, name)));
        }
        for name in &cfg.engine.describe_providers {
            pipeline
                .describer
                .push_generator(&cfg.describe, Box::new(ScriptProvider::new(engine, name)));
        }

        pipeline.langid = language_identifier(cfg, engine);

        info!(
            layout = ?pipeline.layout.labels(),
            ocr = ?pipeline.reader.labels(),
            describe = ?pipeline.describer.labels(),
            langid = ?pipeline.langid.available(),
            "pipeline providers"
        );
        pipeline
    }

    pub fn with_detector(mut self, detector: impl LayoutDetector + 'static) -> Self {
        self.push_detector(Box::new(detector));
        self
    }

    pub fn with_reader(mut self, reader: impl OcrReader + 'static) -> Self {
        self.reader.push_reader(&self.cfg.ocr, Box::new(reader));
        self
    }

    pub fn with_generator(mut self, generator: impl VisionGenerator + 'static) -> Self {
        self.describer
            .push_generator(&self.cfg.describe, Box::new(generator));
        self
    }

    pub fn with_language_identifier(mut self, langid: LanguageIdentifier) -> Self {
        self.langid = langid;
        self
    }

    fn push_detector(&mut self, detector: Box<dyn LayoutDetector>) {
        self.layout.push(Box::new(DetectorLink {
            detector,
            min_score: self.cfg.layout.min_score,
        }));
    }

    pub fn langid(&self) -> &LanguageIdentifier {
        &self.langid
    }

    /// Load and process one image file. Input problems are reported through
    /// the output's `error` field.
    pub fn process_path(&self, input: &Path, requested_stage: i64) -> PageOutput {
        let started = Instant::now();
        match probe::load_page(&self.cfg, input) {
            Ok(page) => self.process(&page, requested_stage),
            Err(err) => {
                warn!("input failed: {err:#}");
                PageOutput::failed(
                    1,
                    Stage::from_request(requested_stage),
                    format!("{err:#}"),
                    started.elapsed().as_secs_f64(),
                )
            }
        }
    }

    /// Run stages `1..=K` for the requested `K`; out-of-range requests run
    /// stage 1 only.
    pub fn process(&self, page: &Page, requested_stage: i64) -> PageOutput {
        let started = Instant::now();
        let stage = Stage::from_request(requested_stage);
        if i64::from(stage.number()) != requested_stage {
            debug!(requested_stage, "clamped to stage {stage}");
        }

        let size = Size {
            w: page.width(),
            h: page.height(),
        };
        let mut out = PageOutput {
            page: page.number,
            size,
            stage,
            elements: Vec::new(),
            text_lines: None,
            overall_text: None,
            detected_languages: None,
            tables: None,
            figures: None,
            charts: None,
            maps: None,
            warnings: Vec::new(),
            processing_time: 0.0,
            error: None,
        };

        let layout = self.layout(page);
        match stage {
            Stage::Layout => {
                out.elements = layout.elements;
                out.warnings = layout.warnings;
            }
            Stage::TextAndLanguage => {
                let text = self.text(page, layout);
                out.elements = text.layout.elements;
                out.warnings = text.layout.warnings;
                out.text_lines = Some(text.text_lines);
                out.overall_text = Some(text.overall_text);
                out.detected_languages = Some(text.detected_languages);
            }
            Stage::Semantics => {
                let sem = self.semantics(page, self.text(page, layout));
                out.elements = sem.text.layout.elements;
                out.warnings = sem.text.layout.warnings;
                out.text_lines = Some(sem.text.text_lines);
                out.overall_text = Some(sem.text.overall_text);
                out.detected_languages = Some(sem.text.detected_languages);
                out.tables = Some(sem.tables);
                out.figures = Some(sem.figures);
                out.charts = Some(sem.charts);
                out.maps = Some(sem.maps);
            }
        }

        out.processing_time = started.elapsed().as_secs_f64();
        info!(
            page = out.page,
            stage = %stage,
            elements = out.elements.len(),
            warnings = out.warnings.len(),
            "page processed"
        );
        out
    }

    pub fn layout(&self, page: &Page) -> LayoutStage {
        let resolved = self.layout.resolve_traced(page);
        let mut warnings = Vec::new();
        if resolved.degraded() {
            warnings.push("layout:template".to_string());
        }
        let elements = resolved
            .candidate
            .value
            .into_iter()
            .enumerate()
            .map(|(id, b)| LayoutElement {
                id,
                cls: b.cls,
                bbox: b.bbox.clip(page.width(), page.height()),
                score: unit_score(b.score),
            })
            .collect();
        LayoutStage { elements, warnings }
    }

    /// OCR every textual element (or the whole page when there are none) and
    /// label each line with its language.
    pub fn text(&self, page: &Page, mut layout: LayoutStage) -> TextStage {
        let mut targets: Vec<(Option<usize>, BBox)> = layout
            .elements
            .iter()
            .filter(|e| LayoutClass::parse(&e.cls).is_textual())
            .map(|e| (Some(e.id), e.bbox))
            .collect();
        if targets.is_empty() {
            targets.push((None, page.full_bbox()));
        }

        let mut text_lines = Vec::new();
        let mut detected_languages: Vec<String> = Vec::new();
        let mut degraded = false;
        for (element_id, bbox) in targets {
            let resolved = self.reader.read_traced(&page.region(bbox));
            degraded |= resolved.degraded();
            for line in resolved.candidate.value {
                let decision = self.langid.detect(&line.text);
                if let Some(lang) = decision.language() {
                    let code = lang.code().to_string();
                    if !detected_languages.contains(&code) {
                        detected_languages.push(code);
                    }
                }
                text_lines.push(LabeledTextRegion {
                    bbox: line.bbox,
                    text: line.text,
                    lang: decision.language_code,
                    score: unit_score(line.confidence),
                    lang_confidence: decision.confidence,
                    lang_reliable: decision.is_reliable,
                    element_id,
                });
            }
        }
        if degraded {
            layout.warnings.push("ocr:template".to_string());
        }
        let overall_text = text_lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        TextStage {
            layout,
            text_lines,
            overall_text,
            detected_languages,
        }
    }

    /// Describe every table, figure, chart and map element.
    pub fn semantics(&self, page: &Page, mut text: TextStage) -> SemanticStage {
        let (mut tables, mut figures, mut charts, mut maps) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        let mut degraded = false;

        for element in &text.layout.elements {
            let Some(kind) = LayoutClass::parse(&element.cls).element_kind() else {
                continue;
            };
            let visual = VisualElement {
                region: page.region(element.bbox),
                kind,
            };
            let resolved = self.describer.describe_traced(&visual);
            degraded |= resolved.degraded();
            let described = DescribedRegion {
                element_id: element.id,
                bbox: element.bbox,
                summary: resolved.candidate.value,
                kind,
                confidence: resolved.candidate.confidence,
                source: resolved.candidate.source_label,
            };
            match kind {
                ElementKind::Table => tables.push(described),
                ElementKind::Figure => figures.push(described),
                ElementKind::Chart => charts.push(described),
                ElementKind::Map => maps.push(described),
            }
        }
        if degraded {
            text.layout.warnings.push("describe:template".to_string());
        }

        SemanticStage {
            text,
            tables,
            figures,
            charts,
            maps,
        }
    }
}

/// The ensemble with the script-backed classifiers for whichever of the
/// statistical and trigram strategies are configured.
pub fn language_identifier(cfg: &Config, engine: &Arc<PythonEngine>) -> LanguageIdentifier {
    let wanted: Vec<StrategyKind> = cfg
        .langid
        .strategies
        .iter()
        .filter_map(|s| StrategyKind::parse(s))
        .collect();
    let mut langid = LanguageIdentifier::new(&cfg.langid);
    if wanted.contains(&StrategyKind::Statistical) {
        langid = langid.with_statistical(ScriptProvider::new(engine, "langid"));
    }
    if wanted.contains(&StrategyKind::Trigram) {
        langid = langid.with_trigram(ScriptProvider::new(engine, "langdetect"));
    }
    langid
}

struct DetectorLink {
    detector: Box<dyn LayoutDetector>,
    min_score: f32,
}

impl Provider<Page, Vec<LayoutBox>> for DetectorLink {
    fn label(&self) -> &str {
        self.detector.label()
    }

    fn provide(&self, page: &Page) -> Result<Scored<Vec<LayoutBox>>, ProviderError> {
        let boxes: Vec<LayoutBox> = self
            .detector
            .detect(page)?
            .into_iter()
            .filter(|b| b.score.is_finite() && b.score >= self.min_score)
            .collect();
        if boxes.is_empty() {
            return Err(ProviderError::Empty);
        }
        let mean = boxes.iter().map(|b| b.score).sum::<f32>() / boxes.len() as f32;
        Ok(Scored::new(boxes, mean))
    }
}

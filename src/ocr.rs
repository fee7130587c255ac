use crate::{
    config::{Config, Ocr},
    engine::{BBox, OcrLine, OcrReader, RegionImage},
    error::ProviderError,
    fallback::{Candidate, FallbackChain, Provider, Resolution, Scored},
    postprocess::clean_line,
    textsim::sequence_ratio,
    util::unit_score,
};
use image::{imageops, DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::{
    contrast::equalize_histogram,
    filter::{gaussian_blur_f32, median_filter},
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

// Gaussian local mean over an 11-pixel block, minus a small offset.
const THRESHOLD_SIGMA: f32 = 2.0;
const THRESHOLD_OFFSET: i16 = 2;

/// A cleaned line of text in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub bbox: BBox,
    pub text: String,
    pub confidence: f32,
}

/// OCR fallback chain: readers in preference order, then a "no text" template.
pub struct TextReader {
    chain: FallbackChain<RegionImage, Vec<TextLine>>,
    preprocess: bool,
}

impl TextReader {
    pub fn new(cfg: &Config) -> Self {
        Self {
            chain: FallbackChain::new(
                "ocr",
                |_: &RegionImage| Vec::new(),
                cfg.fallback.template_confidence,
            ),
            preprocess: cfg.ocr.preprocess,
        }
    }

    pub fn with_reader(mut self, cfg: &Ocr, reader: impl OcrReader + 'static) -> Self {
        self.push_reader(cfg, Box::new(reader));
        self
    }

    pub fn push_reader(&mut self, cfg: &Ocr, reader: Box<dyn OcrReader>) {
        self.chain.push(Box::new(ReaderLink {
            reader,
            cfg: cfg.clone(),
        }));
    }

    pub fn labels(&self) -> Vec<&str> {
        self.chain.labels()
    }

    pub fn read(&self, region: &RegionImage) -> Candidate<Vec<TextLine>> {
        self.chain.resolve(&self.prepared(region))
    }

    pub fn read_traced(&self, region: &RegionImage) -> Resolution<Vec<TextLine>> {
        self.chain.resolve_traced(&self.prepared(region))
    }

    fn prepared<'a>(&self, region: &'a RegionImage) -> Cow<'a, RegionImage> {
        if !self.preprocess {
            return Cow::Borrowed(region);
        }
        Cow::Owned(RegionImage {
            bbox: region.bbox,
            image: preprocess(&region.image),
        })
    }

    pub fn batch_read(&self, regions: &[RegionImage]) -> Vec<Candidate<Vec<TextLine>>> {
        regions.iter().map(|r| self.read(r)).collect()
    }
}

struct ReaderLink {
    reader: Box<dyn OcrReader>,
    cfg: Ocr,
}

impl Provider<RegionImage, Vec<TextLine>> for ReaderLink {
    fn label(&self) -> &str {
        self.reader.label()
    }

    fn provide(&self, region: &RegionImage) -> Result<Scored<Vec<TextLine>>, ProviderError> {
        let raw = self.reader.read(region)?;
        let lines = tidy_lines(&self.cfg, region, raw);
        if lines.is_empty() {
            return Err(ProviderError::Empty);
        }
        let mean = lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len() as f32;
        debug!(reader = self.reader.label(), lines = lines.len(), "ocr lines");
        Ok(Scored::new(lines, mean))
    }
}

/// Binarize a crop for reading: grayscale, histogram equalization, adaptive
/// Gaussian threshold, then a 3x3 median pass against speckle. The result is
/// black text on white, still as RGB.
pub fn preprocess(image: &RgbImage) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let gray = equalize_histogram(&imageops::grayscale(image));
    let local_mean = gaussian_blur_f32(&gray, THRESHOLD_SIGMA);
    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (x, y, px) in binary.enumerate_pixels_mut() {
        let v = i16::from(gray.get_pixel(x, y)[0]);
        let t = i16::from(local_mean.get_pixel(x, y)[0]) - THRESHOLD_OFFSET;
        *px = Luma([if v > t { 255 } else { 0 }]);
    }
    DynamicImage::ImageLuma8(median_filter(&binary, 1, 1)).to_rgb8()
}

/// Clean, place on the page, and sort top-to-bottom then left-to-right.
/// Lines that clean to nothing are dropped.
pub fn tidy_lines(cfg: &Ocr, region: &RegionImage, raw: Vec<OcrLine>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = raw
        .into_iter()
        .filter_map(|line| {
            let text = clean_line(cfg, &line.text)?;
            let local = BBox::from_polygon(&line.polygon).unwrap_or(BBox::new(
                0.0,
                0.0,
                region.bbox.w,
                region.bbox.h,
            ));
            Some(TextLine {
                bbox: local.offset(region.bbox.x, region.bbox.y),
                text,
                confidence: unit_score(line.confidence),
            })
        })
        .collect();
    lines.sort_by(|a, b| a.bbox.y.total_cmp(&b.bbox.y).then(a.bbox.x.total_cmp(&b.bbox.x)));
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorRates {
    pub cer: f32,
    pub wer: f32,
    pub cer_percentage: f32,
    pub wer_percentage: f32,
}

/// Character and word error rates as `1 - sequence_ratio`. With an empty
/// reference, WER is 1 for any non-empty prediction and 0 otherwise.
pub fn error_rates(predicted: &str, ground_truth: &str) -> ErrorRates {
    let pred_chars: Vec<char> = predicted.chars().collect();
    let gt_chars: Vec<char> = ground_truth.chars().collect();
    let cer = 1.0 - sequence_ratio(&pred_chars, &gt_chars);

    let pred_words: Vec<&str> = predicted.split_whitespace().collect();
    let gt_words: Vec<&str> = ground_truth.split_whitespace().collect();
    let wer = if gt_words.is_empty() {
        if pred_words.is_empty() { 0.0 } else { 1.0 }
    } else {
        1.0 - sequence_ratio(&pred_words, &gt_words)
    };

    ErrorRates {
        cer,
        wer,
        cer_percentage: cer * 100.0,
        wer_percentage: wer * 100.0,
    }
}

use docstage::{
    config::{Config, Ocr},
    engine::{BBox, OcrLine, OcrReader, RegionImage},
    error::ProviderError,
    ocr::{error_rates, preprocess, TextReader},
    postprocess::clean_line,
};
use image::{Rgb, RgbImage};
use std::sync::{Arc, Mutex};

struct Lines(Vec<OcrLine>);

impl OcrReader for Lines {
    fn label(&self) -> &str {
        "lines"
    }

    fn read(&self, _region: &RegionImage) -> Result<Vec<OcrLine>, ProviderError> {
        Ok(self.0.clone())
    }
}

struct Offline;

impl OcrReader for Offline {
    fn label(&self) -> &str {
        "offline"
    }

    fn read(&self, _region: &RegionImage) -> Result<Vec<OcrLine>, ProviderError> {
        Err(ProviderError::Unavailable("reader not installed".into()))
    }
}

fn line(x: f32, y: f32, text: &str, confidence: f32) -> OcrLine {
    OcrLine {
        polygon: vec![[x, y], [x + 30.0, y], [x + 30.0, y + 10.0], [x, y + 10.0]],
        text: text.to_string(),
        confidence,
    }
}

fn region() -> RegionImage {
    RegionImage {
        bbox: BBox::new(10.0, 20.0, 100.0, 50.0),
        image: RgbImage::new(100, 50),
    }
}

#[test]
fn cleanup_strips_artifacts_and_collapses_whitespace() {
    let cfg = Ocr::default();
    assert_eq!(
        clean_line(&cfg, "  Hello,   world!! ").as_deref(),
        Some("Hello world")
    );
    assert_eq!(clean_line(&cfg, "a\u{0002}b").as_deref(), Some("ab"));
    assert_eq!(clean_line(&cfg, "tab\tsplit").as_deref(), Some("tab split"));
    assert_eq!(clean_line(&cfg, "***"), None);
    assert_eq!(clean_line(&cfg, "   "), None);
}

#[test]
fn cleanup_keeps_devanagari_and_arabic_script() {
    let cfg = Ocr::default();
    assert_eq!(clean_line(&cfg, "नमस्ते।").as_deref(), Some("नमस्ते।"));
    assert_eq!(
        clean_line(&cfg, "مرحبا، بالعالم").as_deref(),
        Some("مرحبا، بالعالم")
    );
}

#[test]
fn cleanup_normalizes_compatibility_forms() {
    let cfg = Ocr::default();
    assert_eq!(clean_line(&cfg, "\u{FB01}le").as_deref(), Some("file"));

    let raw = Ocr {
        normalize_unicode: false,
        strip_artifacts: false,
        min_line_chars: 3,
        ..Ocr::default()
    };
    assert_eq!(clean_line(&raw, "a!"), None);
    assert_eq!(clean_line(&raw, "a!?").as_deref(), Some("a!?"));
}

#[test]
fn reader_output_is_cleaned_placed_and_sorted() {
    let cfg = Config::default();
    let reader = TextReader::new(&cfg).with_reader(
        &cfg.ocr,
        Lines(vec![
            line(40.0, 30.0, "second line", 0.8),
            line(50.0, 0.0, "right", 0.9),
            line(0.0, 0.0, "left", 0.7),
            line(0.0, 15.0, "@@@", 0.9),
        ]),
    );

    let c = reader.read(&region());
    assert_eq!(c.source_label, "lines");
    let texts: Vec<&str> = c.value.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["left", "right", "second line"]);
    assert_eq!(c.value[0].bbox, BBox::new(10.0, 20.0, 30.0, 10.0));
    assert_eq!(c.value[2].bbox, BBox::new(50.0, 50.0, 30.0, 10.0));
    assert!((c.confidence - 0.8).abs() < 1e-6);
}

#[test]
fn readers_fall_through_to_no_text_template() {
    let cfg = Config::default();
    let reader = TextReader::new(&cfg)
        .with_reader(&cfg.ocr, Offline)
        .with_reader(&cfg.ocr, Lines(vec![line(0.0, 0.0, "!!!", 0.9)]));

    let res = reader.read_traced(&region());
    assert!(res.degraded());
    assert!(res.candidate.value.is_empty());
    assert_eq!(res.candidate.confidence, 0.5);
    assert_eq!(res.failures.len(), 2);
}

#[test]
fn secondary_reader_used_when_primary_fails() {
    let cfg = Config::default();
    let reader = TextReader::new(&cfg)
        .with_reader(&cfg.ocr, Offline)
        .with_reader(&cfg.ocr, Lines(vec![line(0.0, 0.0, "fallback", 0.6)]));
    let out = reader.batch_read(&[region(), region()]);
    assert_eq!(out.len(), 2);
    for c in out {
        assert_eq!(c.source_label, "lines");
        assert_eq!(c.value[0].text, "fallback");
    }
}

#[test]
fn error_rates_edge_cases() {
    let same = error_rates("the cat sat", "the cat sat");
    assert_eq!(same.cer, 0.0);
    assert_eq!(same.wer, 0.0);

    let r = error_rates("the cat sat", "the cat sat down");
    assert!((r.wer - 1.0 / 7.0).abs() < 1e-6);
    assert!((r.wer_percentage - r.wer * 100.0).abs() < 1e-4);

    assert_eq!(error_rates("words", "").wer, 1.0);
    let both_empty = error_rates("", "");
    assert_eq!(both_empty.wer, 0.0);
    assert_eq!(both_empty.cer, 0.0);
}

/// Remembers the last crop it was handed.
struct Recorder(Arc<Mutex<Option<RgbImage>>>);

impl OcrReader for Recorder {
    fn label(&self) -> &str {
        "recorder"
    }

    fn read(&self, region: &RegionImage) -> Result<Vec<OcrLine>, ProviderError> {
        *self.0.lock().expect("lock") = Some(region.image.clone());
        Ok(vec![line(0.0, 0.0, "seen", 0.9)])
    }
}

fn gray_with_stroke() -> RgbImage {
    let mut img = RgbImage::from_pixel(40, 40, Rgb([128, 128, 128]));
    for x in 0..40 {
        for y in 19..21 {
            img.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    img
}

fn is_binary(img: &RgbImage) -> bool {
    img.pixels().all(|p| p.0 == [0, 0, 0] || p.0 == [255, 255, 255])
}

#[test]
fn preprocessing_binarizes_to_dark_strokes_on_white() {
    let out = preprocess(&gray_with_stroke());
    assert_eq!(out.dimensions(), (40, 40));
    assert!(is_binary(&out));
    assert_eq!(out.get_pixel(20, 19).0, [0, 0, 0]);
    assert_eq!(out.get_pixel(20, 5).0, [255, 255, 255]);
    assert_eq!(preprocess(&RgbImage::new(0, 0)).dimensions(), (0, 0));
}

#[test]
fn reader_receives_preprocessed_crop_when_enabled() {
    let seen = Arc::new(Mutex::new(None));
    let cfg = Config::default();
    assert!(cfg.ocr.preprocess);
    let reader = TextReader::new(&cfg).with_reader(&cfg.ocr, Recorder(Arc::clone(&seen)));
    let crop = RegionImage {
        bbox: BBox::new(0.0, 0.0, 40.0, 40.0),
        image: gray_with_stroke(),
    };

    let got = reader.read(&crop);
    assert_eq!(got.value[0].text, "seen");
    let img = seen.lock().expect("lock").take().expect("reader called");
    assert!(is_binary(&img));

    let mut raw_cfg = Config::default();
    raw_cfg.ocr.preprocess = false;
    let reader = TextReader::new(&raw_cfg).with_reader(&raw_cfg.ocr, Recorder(Arc::clone(&seen)));
    reader.read(&crop);
    let img = seen.lock().expect("lock").take().expect("reader called");
    assert_eq!(img.get_pixel(0, 0).0, [128, 128, 128]);
}

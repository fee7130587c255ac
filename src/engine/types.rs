use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned box `[x, y, w, h]` in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    /// Negative or non-finite components are floored at 0.
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        let pos = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            x: pos(x),
            y: pos(y),
            w: pos(w),
            h: pos(h),
        }
    }

    pub fn from_polygon(points: &[[f32; 2]]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (mut x0, mut y0) = (f32::MAX, f32::MAX);
        let (mut x1, mut y1) = (f32::MIN, f32::MIN);
        for [x, y] in points {
            x0 = x0.min(*x);
            y0 = y0.min(*y);
            x1 = x1.max(*x);
            y1 = y1.max(*y);
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Restrict the box to a `width` x `height` image.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (wf, hf) = (width as f32, height as f32);
        let x = self.x.min(wf);
        let y = self.y.min(hf);
        Self::new(x, y, self.w.min(wf - x), self.h.min(hf - y))
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.w, b.h]
    }
}

/// One decoded page. Pixels are read-only for the lifetime of a request.
#[derive(Debug, Clone)]
pub struct Page {
    pub number: u32,
    pub path: Option<PathBuf>,
    pub image: RgbImage,
}

impl Page {
    pub fn new(image: RgbImage) -> Self {
        Self {
            number: 1,
            path: None,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn full_bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Crop `bbox` (clipped to the page) into an owned region.
    pub fn region(&self, bbox: BBox) -> RegionImage {
        let b = bbox.clip(self.width(), self.height());
        let image = image::imageops::crop_imm(
            &self.image,
            b.x as u32,
            b.y as u32,
            b.w as u32,
            b.h as u32,
        )
        .to_image();
        RegionImage { bbox: b, image }
    }
}

/// Pixels of one region together with where they came from on the page.
#[derive(Debug, Clone)]
pub struct RegionImage {
    pub bbox: BBox,
    pub image: RgbImage,
}

impl RegionImage {
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.image.dimensions();
        if h > 0 { w as f32 / h as f32 } else { 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    pub bbox: BBox,
    pub cls: String,
    pub score: f32,
}

/// One recognized line as reported by an OCR reader, in region coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    pub polygon: Vec<[f32; 2]>,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutClass {
    Background,
    Text,
    Title,
    List,
    Table,
    Figure,
    Chart,
    Map,
}

impl LayoutClass {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "paragraph" | "plain text" => LayoutClass::Text,
            "title" | "heading" | "header" => LayoutClass::Title,
            "list" => LayoutClass::List,
            "table" => LayoutClass::Table,
            "figure" | "picture" | "image" => LayoutClass::Figure,
            "chart" | "plot" | "graph" => LayoutClass::Chart,
            "map" => LayoutClass::Map,
            _ => LayoutClass::Background,
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, LayoutClass::Text | LayoutClass::Title | LayoutClass::List)
    }

    /// The description kind for non-text regions.
    pub fn element_kind(self) -> Option<ElementKind> {
        match self {
            LayoutClass::Table => Some(ElementKind::Table),
            LayoutClass::Figure => Some(ElementKind::Figure),
            LayoutClass::Chart => Some(ElementKind::Chart),
            LayoutClass::Map => Some(ElementKind::Map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Table,
    Chart,
    Map,
    Figure,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Table => "table",
            ElementKind::Chart => "chart",
            ElementKind::Map => "map",
            ElementKind::Figure => "figure",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "table" => Some(ElementKind::Table),
            "chart" => Some(ElementKind::Chart),
            "map" => Some(ElementKind::Map),
            "figure" => Some(ElementKind::Figure),
            _ => None,
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

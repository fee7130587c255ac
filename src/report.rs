use crate::{
    engine::{BBox, ElementKind},
    policy::Stage,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    pub id: usize,
    pub cls: String,
    pub bbox: BBox,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTextRegion {
    pub bbox: BBox,
    pub text: String,
    pub lang: String,
    pub score: f32,
    pub lang_confidence: f32,
    pub lang_reliable: bool,
    /// Layout element the line was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedRegion {
    pub element_id: usize,
    pub bbox: BBox,
    pub summary: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub confidence: f32,
    pub source: String,
}

/// Per-page result. Later stages only ever add fields: `text_lines` and its
/// aggregates appear from stage 2, the four described-region lists from stage 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutput {
    pub page: u32,
    pub size: Size,
    pub stage: Stage,
    pub elements: Vec<LayoutElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_lines: Option<Vec<LabeledTextRegion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<DescribedRegion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figures: Option<Vec<DescribedRegion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<DescribedRegion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<Vec<DescribedRegion>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageOutput {
    pub fn failed(page: u32, stage: Stage, error: impl Into<String>, processing_time: f64) -> Self {
        Self {
            page,
            size: Size { w: 0, h: 0 },
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
            processing_time,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// All described regions in element order.
    pub fn described(&self) -> Vec<&DescribedRegion> {
        let mut all: Vec<&DescribedRegion> = [&self.tables, &self.figures, &self.charts, &self.maps]
            .into_iter()
            .flatten()
            .flatten()
            .collect();
        all.sort_by_key(|d| d.element_id);
        all
    }
}

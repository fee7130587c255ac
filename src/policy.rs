use crate::{config::Evaluation, engine::ElementKind};
use serde::{Deserialize, Serialize};

/// Processing depth. Each stage includes every earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Stage {
    Layout = 1,
    TextAndLanguage = 2,
    Semantics = 3,
}

impl Stage {
    /// Anything outside `1..=3` degrades to [`Stage::Layout`].
    pub fn from_request(requested: i64) -> Self {
        match requested {
            2 => Stage::TextAndLanguage,
            3 => Stage::Semantics,
            _ => Stage::Layout,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }
}

impl From<u8> for Stage {
    fn from(v: u8) -> Self {
        Stage::from_request(i64::from(v))
    }
}

impl From<Stage> for u8 {
    fn from(s: Stage) -> Self {
        s.number()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Convex weights for blending the primary and secondary evaluation scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub primary: f32,
    pub secondary: f32,
}

impl WeightProfile {
    /// Negative or non-finite weights count as 0; the pair is rescaled to sum
    /// to 1, or split evenly if nothing is left.
    pub fn normalized(primary: f32, secondary: f32) -> Self {
        let clean = |w: f32| if w.is_finite() { w.max(0.0) } else { 0.0 };
        let (p, s) = (clean(primary), clean(secondary));
        let sum = p + s;
        if sum <= 0.0 {
            return Self {
                primary: 0.5,
                secondary: 0.5,
            };
        }
        Self {
            primary: p / sum,
            secondary: s / sum,
        }
    }

    pub fn blend(&self, primary: f32, secondary: f32) -> f32 {
        self.primary * primary + self.secondary * secondary
    }
}

pub fn weight_profile(cfg: &Evaluation, kind: ElementKind) -> WeightProfile {
    let [p, s] = match kind {
        ElementKind::Chart => cfg.chart_weights,
        ElementKind::Map => cfg.map_weights,
        ElementKind::Table => cfg.table_weights,
        ElementKind::Figure => cfg.figure_weights,
    };
    WeightProfile::normalized(p, s)
}
